//! Renders [`IgdbQuery`] values into the provider's query language.

use crate::domain::query::IgdbQuery;

const GAME_DETAIL_FIELDS: &str = "name,summary,storyline,cover.url,first_release_date,\
genres.name,platforms.name,involved_companies.company.name,involved_companies.developer,\
involved_companies.publisher,screenshots.url,aggregated_rating,rating,rating_count,\
total_rating,total_rating_count,franchises.name,collections.name,alternative_names.name,\
similar_games,dlcs,expansions,category,parent_game";

const GAME_SEARCH_FIELDS: &str =
    "name,summary,cover.url,first_release_date,genres.name,platforms.name,rating,rating_count";

const SEARCH_FIELDS: &str = "name,cover.url,first_release_date";

const POPULAR_FIELDS: &str =
    "name,summary,cover.url,first_release_date,genres.name,platforms.name,rating,rating_count";

pub fn render(query: &IgdbQuery) -> String {
    match query {
        IgdbQuery::GameById { game_id } => {
            format!("fields {GAME_DETAIL_FIELDS}; where id = {game_id};")
        }
        IgdbQuery::GameSearch { search_term, limit } => format!(
            "search {}; fields {GAME_SEARCH_FIELDS}; limit {limit};",
            quote(search_term)
        ),
        IgdbQuery::RawGames { query } => query.clone(),
        IgdbQuery::Search { search_term, limit } => format!(
            "search {}; fields {SEARCH_FIELDS}; limit {limit};",
            quote(search_term)
        ),
        IgdbQuery::Popular { limit } => format!(
            "fields {POPULAR_FIELDS}; where rating > 75 & rating_count > 100; sort rating desc; limit {limit};"
        ),
    }
}

fn quote(term: &str) -> String {
    let mut quoted = String::with_capacity(term.len() + 2);
    quoted.push('"');
    for ch in term.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_by_id_requests_detail_fields() {
        let text = render(&IgdbQuery::GameById { game_id: 1942 });
        assert!(text.starts_with("fields name,summary"));
        assert!(text.contains("involved_companies.company.name"));
        assert!(text.ends_with("where id = 1942;"));
    }

    #[test]
    fn game_search_uses_quoted_term_and_limit() {
        let text = render(&IgdbQuery::GameSearch {
            search_term: "witcher 3".into(),
            limit: 20,
        });
        assert!(text.starts_with(r#"search "witcher 3"; fields "#));
        assert!(text.ends_with("limit 20;"));
    }

    #[test]
    fn search_projection_is_lighter_than_game_search() {
        let search = render(&IgdbQuery::Search {
            search_term: "mario".into(),
            limit: 10,
        });
        let games = render(&IgdbQuery::GameSearch {
            search_term: "mario".into(),
            limit: 10,
        });
        assert_eq!(
            search,
            r#"search "mario"; fields name,cover.url,first_release_date; limit 10;"#
        );
        assert!(search.len() < games.len());
    }

    #[test]
    fn popular_uses_fixed_rating_filter() {
        let text = render(&IgdbQuery::Popular { limit: 5 });
        assert!(text.contains("where rating > 75 & rating_count > 100;"));
        assert!(text.contains("sort rating desc;"));
        assert!(text.ends_with("limit 5;"));
    }

    #[test]
    fn raw_query_passes_through_verbatim() {
        let raw = "fields name; where id = (1,2,3); limit 3;";
        assert_eq!(
            render(&IgdbQuery::RawGames { query: raw.into() }),
            raw
        );
    }

    #[test]
    fn search_terms_are_escaped() {
        let text = render(&IgdbQuery::Search {
            search_term: r#"say "hi" \o/"#.into(),
            limit: 1,
        });
        assert!(text.starts_with(r#"search "say \"hi\" \\o/";"#));
    }
}
