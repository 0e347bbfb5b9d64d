use std::{fmt::Write as _, sync::Arc};

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::{
    AppState,
    error::{CatalogError, CatalogResult},
    models::{MovieRecord, ReviewRecord},
    store::Catalog,
};

const SEARCH_RESULTS: u64 = 10;
const TOP_MOVIES: u64 = 5;
const CARD_REVIEWS: u64 = 3;
const EXCERPT_CHARS: usize = 100;

const HELP: &str = "Commands:\n\
/search <title> - find movies by title\n\
/top - best rated movies\n\
/help - this message\n\
Send a movie title to see its details.";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Start,
    Help,
    Search(String),
    Top,
    Lookup(String),
    Unknown(String),
}

impl Command {
    /// Blank messages are ignored. A `@botname` suffix on a command is dropped.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(rest) = text.strip_prefix('/') else {
            return Some(Command::Lookup(text.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "search" => Command::Search(argument.to_string()),
            "top" => Command::Top,
            _ => Command::Unknown(name.clone()),
        })
    }
}

pub async fn respond(catalog: &Catalog, command: Command) -> String {
    debug!(?command, "bot command");
    let reply = match command {
        Command::Start => Ok(start(catalog).await),
        Command::Help => Ok(HELP.to_string()),
        Command::Search(text) => search(catalog, &text).await,
        Command::Top => top(catalog).await,
        Command::Lookup(title) => lookup(catalog, &title).await,
        Command::Unknown(name) => Ok(format!("Unknown command /{name}. Send /help for the list.")),
    };
    reply.unwrap_or_else(|err| failure_reply(&err))
}

async fn start(catalog: &Catalog) -> String {
    let status = match catalog.ping().await {
        Ok(()) => "Database connected.",
        Err(_) => "Database unavailable.",
    };
    format!("Hello! I know about movies and their reviews.\n{status}\n\n{HELP}")
}

async fn search(catalog: &Catalog, text: &str) -> CatalogResult<String> {
    if text.trim().is_empty() {
        return Ok("Usage: /search <title>".to_string());
    }
    let movies = catalog.search_titles(text, SEARCH_RESULTS).await?;
    match movies.as_slice() {
        [] => Ok(format!("No movies found for '{}'.", text.trim())),
        [movie] => card(catalog, movie).await,
        many => Ok(movie_list(&format!("Movies matching '{}':", text.trim()), many)),
    }
}

async fn top(catalog: &Catalog) -> CatalogResult<String> {
    let movies = catalog.top_rated(TOP_MOVIES).await?;
    if movies.is_empty() {
        return Ok("No reviewed movies yet.".to_string());
    }
    Ok(movie_list("Top rated:", &movies))
}

async fn lookup(catalog: &Catalog, title: &str) -> CatalogResult<String> {
    match catalog.find_movie_by_title(title).await? {
        Some(movie) => card(catalog, &movie).await,
        None => Ok(format!("Movie '{title}' not found. Try /search {title}")),
    }
}

async fn card(catalog: &Catalog, movie: &MovieRecord) -> CatalogResult<String> {
    let reviews = catalog.recent_reviews(movie.id, CARD_REVIEWS).await?;
    Ok(movie_card(movie, &reviews))
}

fn failure_reply(err: &CatalogError) -> String {
    match err {
        CatalogError::Connectivity(_) => "Database unavailable, try again later.".to_string(),
        other => {
            error!(error = %other, "bot command failed");
            "Something went wrong, try again later.".to_string()
        },
    }
}

fn rating(movie: &MovieRecord) -> String {
    format!("{:.1}/10 ({} reviews)", movie.avg_rating, movie.review_count)
}

pub fn movie_list(heading: &str, movies: &[MovieRecord]) -> String {
    let mut out = heading.to_string();
    for (i, movie) in movies.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, movie.title);
        if let Some(year) = movie.release_year {
            let _ = write!(out, " ({year})");
        }
        let _ = write!(out, " - {}", rating(movie));
    }
    out
}

pub fn movie_card(movie: &MovieRecord, reviews: &[ReviewRecord]) -> String {
    let mut out = movie.title.clone();
    if let Some(year) = movie.release_year {
        let _ = write!(out, " ({year})");
    }
    let _ = write!(out, "\nDirector: {}", movie.director);
    if let Some(genre) = movie.genre {
        let _ = write!(out, "\nGenre: {genre}");
    }
    if let Some(minutes) = movie.duration_minutes {
        let _ = write!(out, "\nDuration: {minutes} min");
    }
    let _ = write!(out, "\nRating: {}", rating(movie));
    if let Some(description) = &movie.description {
        let _ = write!(out, "\n\n{description}");
    }

    if !reviews.is_empty() {
        out.push_str("\n\nRecent reviews:");
        for review in reviews {
            let _ = write!(out, "\n- {} {}/10", review.user_name, review.rating);
            if let Some(text) = &review.review_text {
                let _ = write!(out, ": {}", excerpt(text));
            }
        }
    }
    out
}

pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct BotMessage {
    text: String,
}

#[derive(Debug, Serialize)]
pub struct BotReply {
    reply: String,
}

pub async fn message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<BotMessage>,
) -> Json<BotReply> {
    let reply = match Command::parse(&message.text) {
        Some(command) => respond(&state.catalog, command).await,
        None => HELP.to_string(),
    };
    Json(BotReply { reply })
}

/// Reads commands from stdin, one per line, until EOF.
pub async fn run_console(catalog: Catalog) -> anyhow::Result<()> {
    info!("bot console ready, send /help");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let reply = respond(&catalog, command).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::{
        config::Config,
        models::Genre,
        store::testing::{add_movie, add_review, catalog},
    };

    /// Lazy pool whose every acquire fails: the directory does not exist.
    async fn unreachable_catalog() -> Catalog {
        let config = Config {
            addr: ([127, 0, 0, 1], 0).into(),
            database_url: "sqlite:///nonexistent_movie_reviews_dir/catalog.db".to_string(),
            db_max_connections: 1,
            db_connect_timeout_secs: 1,
            bot_enabled: true,
        };
        Catalog::new(crate::db::connect(&config).await.unwrap())
    }

    fn heat() -> MovieRecord {
        MovieRecord {
            id: 1,
            title: "Heat".into(),
            director: "Michael Mann".into(),
            release_year: Some(1995),
            genre: Some(Genre::Crime),
            description: None,
            duration_minutes: Some(170),
            avg_rating: 8.5,
            review_count: 2,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn parses_commands_and_plain_titles() {
        assert_eq!(Command::parse("  "), None);
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/HELP"), Some(Command::Help));
        assert_eq!(Command::parse("/top@reviews_bot"), Some(Command::Top));
        assert_eq!(
            Command::parse("/search  the thing "),
            Some(Command::Search("the thing".into()))
        );
        assert_eq!(Command::parse("/search"), Some(Command::Search(String::new())));
        assert_eq!(Command::parse(" Heat "), Some(Command::Lookup("Heat".into())));
        assert_eq!(Command::parse("/dance"), Some(Command::Unknown("dance".into())));
    }

    #[test]
    fn long_review_text_is_cut() {
        let long = "é".repeat(150);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
        assert_eq!(excerpt(&"a".repeat(100)), "a".repeat(100));
    }

    #[test]
    fn card_shows_details_and_reviews() {
        let review = ReviewRecord {
            id: 1,
            movie_id: 1,
            user_name: "ann".into(),
            rating: 9,
            review_text: Some("Tense".into()),
            created_at: Timestamp::UNIX_EPOCH,
        };
        let card = movie_card(&heat(), &[review]);
        assert!(card.starts_with("Heat (1995)\nDirector: Michael Mann\nGenre: Crime"));
        assert!(card.contains("Rating: 8.5/10 (2 reviews)"));
        assert!(card.ends_with("- ann 9/10: Tense"));
    }

    #[test]
    fn list_numbers_entries() {
        let ali = MovieRecord { title: "Ali".into(), release_year: None, ..heat() };
        let list = movie_list("Top rated:", &[heat(), ali]);
        assert_eq!(
            list,
            "Top rated:\n1. Heat (1995) - 8.5/10 (2 reviews)\n2. Ali - 8.5/10 (2 reviews)"
        );
    }

    #[tokio::test]
    async fn unreachable_store_degrades_each_reply() {
        let catalog = unreachable_catalog().await;

        let commands = [Command::Top, Command::Lookup("Heat".into()), Command::Search("he".into())];
        for command in commands {
            assert_eq!(respond(&catalog, command).await, "Database unavailable, try again later.");
        }
        assert!(respond(&catalog, Command::Start).await.contains("Database unavailable."));
        assert_eq!(respond(&catalog, Command::Help).await, HELP);
    }

    #[tokio::test]
    async fn replies_come_from_the_catalog() {
        let catalog = catalog().await;
        let heat = add_movie(&catalog, "Heat", None).await;
        add_movie(&catalog, "Heathers", None).await;
        add_review(&catalog, heat, "ann", 8).await;

        let reply = respond(&catalog, Command::Search("heat".into())).await;
        assert!(reply.starts_with("Movies matching 'heat':\n1. Heat"));

        let reply = respond(&catalog, Command::Search("thers".into())).await;
        assert!(reply.starts_with("Heathers\nDirector:"));

        let reply = respond(&catalog, Command::Lookup("heat".into())).await;
        assert!(reply.contains("Recent reviews:\n- ann 8/10"));

        let reply = respond(&catalog, Command::Lookup("Thief".into())).await;
        assert_eq!(reply, "Movie 'Thief' not found. Try /search Thief");

        let reply = respond(&catalog, Command::Top).await;
        assert_eq!(reply.lines().count(), 2);

        assert!(respond(&catalog, Command::Start).await.contains("Database connected."));
        assert_eq!(respond(&catalog, Command::Search(" ".into())).await, "Usage: /search <title>");
    }
}
