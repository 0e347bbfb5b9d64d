use maud::{DOCTYPE, Markup, html};
use sea_orm::Iterable;

use crate::models::{Genre, MovieRecord, ReviewRecord};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

pub fn index_page(movies: &[MovieRecord]) -> String {
    page(
        "Movie Reviews",
        html! {
            div class="min-h-screen bg-gray-50" {
                div class="max-w-4xl mx-auto px-6 py-12" {
                    div class="flex items-start justify-between gap-6" {
                        div {
                            h1 class="text-3xl font-bold text-gray-900" { "Movie Reviews" }
                            p class="mt-2 text-gray-600" { "Every movie in the catalog, best rated first." }
                        }
                        a class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" href="/add-movie" { "Add movie" }
                    }

                    @if movies.is_empty() {
                        div class="mt-10 bg-white shadow rounded-lg p-8" {
                            p class="text-gray-600" { "No movies yet." }
                        }
                    } @else {
                        div class="mt-10 space-y-4" {
                            @for movie in movies {
                                (movie_card(movie))
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn movie_detail_page(movie: &MovieRecord, reviews: &[ReviewRecord]) -> String {
    page(
        &movie.title,
        html! {
            div class="min-h-screen bg-gray-50" {
                div class="max-w-3xl mx-auto px-6 py-12" {
                    a class="text-sm text-blue-600 hover:text-blue-800" href="/" { "All movies" }

                    div class="mt-4 bg-white shadow rounded-lg p-8" {
                        h1 class="text-3xl font-bold text-gray-900" {
                            (movie.title)
                            @if let Some(year) = movie.release_year {
                                span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                            }
                        }
                        p class="mt-2 text-gray-600" { "Directed by " (movie.director) }
                        (rating_line(movie))
                        @if let Some(genre) = movie.genre {
                            p class="mt-1 text-sm text-gray-500" { (genre) }
                        }
                        @if let Some(minutes) = movie.duration_minutes {
                            p class="mt-1 text-sm text-gray-500" { (minutes) " min" }
                        }
                        @if let Some(description) = &movie.description {
                            p class="mt-4 text-gray-700" { (description) }
                        }
                    }

                    (review_form(movie.id))

                    div class="mt-8 space-y-4" {
                        h2 class="text-xl font-semibold text-gray-900" { "Reviews" }
                        @if reviews.is_empty() {
                            p class="text-gray-600" { "No reviews yet." }
                        }
                        @for review in reviews {
                            (review_card(review))
                        }
                    }
                }
            }
        },
    )
}

pub fn add_movie_page() -> String {
    page(
        "Add movie",
        html! {
            div class="min-h-screen bg-gray-50" {
                div class="max-w-2xl mx-auto px-6 py-12" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-3xl font-bold text-gray-900" { "Add movie" }

                        form class="mt-8 space-y-6" method="post" action="/add-movie" {
                            (text_field("title", "Title", true))
                            (text_field("director", "Director", true))

                            div {
                                label class="block text-sm font-medium text-gray-700" for="release_year" { "Release year" }
                                input class=(INPUT_CLASS) type="number" name="release_year" id="release_year" min="1888" max="2100";
                            }

                            div {
                                label class="block text-sm font-medium text-gray-700" for="genre" { "Genre" }
                                select class=(INPUT_CLASS) name="genre" id="genre" {
                                    option value="" { "None" }
                                    @for genre in Genre::iter() {
                                        option value=(genre.label()) { (genre) }
                                    }
                                }
                            }

                            div {
                                label class="block text-sm font-medium text-gray-700" for="description" { "Description" }
                                textarea class=(INPUT_CLASS) name="description" id="description" rows="4" maxlength="2000" {}
                            }

                            button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Save" }
                        }
                    }
                }
            }
        },
    )
}

pub fn error_page(message: String) -> String {
    page(
        "Error",
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Error" }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

const INPUT_CLASS: &str = "mt-2 w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500";

fn page(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
            }
            body { (body) }
        }
    }
    .into_string()
}

fn text_field(name: &str, label: &str, required: bool) -> Markup {
    html! {
        div {
            label class="block text-sm font-medium text-gray-700" for=(name) { (label) }
            input class=(INPUT_CLASS) name=(name) id=(name) maxlength="255" required[required];
        }
    }
}

fn rating_line(movie: &MovieRecord) -> Markup {
    html! {
        p class="mt-2 text-sm text-gray-700" {
            span class="font-semibold" { (format!("{:.1}", movie.avg_rating)) "/10" }
            span class="text-gray-500" { " · " (movie.review_count) " reviews" }
        }
    }
}

fn movie_card(movie: &MovieRecord) -> Markup {
    html! {
        div class="bg-white shadow rounded-lg p-6" {
            div class="flex items-start justify-between gap-4" {
                div {
                    h2 class="text-xl font-semibold text-gray-900" {
                        a class="hover:text-blue-700" href=(format!("/movies/{}", movie.id)) { (movie.title) }
                        @if let Some(year) = movie.release_year {
                            span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                        }
                    }
                    p class="mt-1 text-sm text-gray-500" {
                        (movie.director)
                        @if let Some(genre) = movie.genre {
                            " · " (genre)
                        }
                    }
                }
                (rating_line(movie))
            }
        }
    }
}

fn review_form(movie_id: i32) -> Markup {
    html! {
        div class="mt-8 bg-white shadow rounded-lg p-8" {
            h2 class="text-xl font-semibold text-gray-900" { "Write a review" }
            form class="mt-6 space-y-4" method="post" action=(format!("/movies/{movie_id}/review")) {
                div {
                    label class="block text-sm font-medium text-gray-700" for="user_name" { "Your name" }
                    input class=(INPUT_CLASS) name="user_name" id="user_name" maxlength="100" required;
                }
                div {
                    label class="block text-sm font-medium text-gray-700" for="rating" { "Rating" }
                    input class=(INPUT_CLASS) type="number" name="rating" id="rating" min="1" max="10" required;
                }
                div {
                    label class="block text-sm font-medium text-gray-700" for="review_text" { "Review" }
                    textarea class=(INPUT_CLASS) name="review_text" id="review_text" rows="3" maxlength="1000" {}
                }
                button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Post review" }
            }
        }
    }
}

fn review_card(review: &ReviewRecord) -> Markup {
    let author_url = format!("/api/v1/reviews/user/{}", urlencoding::encode(&review.user_name));
    html! {
        div class="border-l-4 border-blue-500 bg-white shadow rounded-lg p-4" {
            p class="text-sm text-gray-700" {
                span class="font-semibold" { (review.rating) "/10" }
                " by "
                a class="text-blue-600 hover:text-blue-800" href=(author_url) { (review.user_name) }
                span class="text-gray-500" { " · " (review.created_at.strftime("%Y-%m-%d")) }
            }
            @if let Some(text) = &review.review_text {
                p class="mt-2 text-gray-700" { (text) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    fn movie() -> MovieRecord {
        MovieRecord {
            id: 3,
            title: "Heat <1995>".into(),
            director: "Michael Mann".into(),
            release_year: Some(1995),
            genre: Some(Genre::Crime),
            description: None,
            duration_minutes: Some(170),
            avg_rating: 7.0,
            review_count: 2,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn index_links_each_movie_and_escapes_titles() {
        let html = index_page(&[movie()]);
        assert!(html.contains("href=\"/movies/3\""));
        assert!(html.contains("Heat &lt;1995&gt;"));
        assert!(html.contains("7.0"));
    }

    #[test]
    fn detail_page_lists_reviews() {
        let review = ReviewRecord {
            id: 1,
            movie_id: 3,
            user_name: "Ann Lee".into(),
            rating: 8,
            review_text: Some("Great".into()),
            created_at: Timestamp::UNIX_EPOCH,
        };
        let html = movie_detail_page(&movie(), &[review]);
        assert!(html.contains("Great"));
        assert!(html.contains("/api/v1/reviews/user/Ann%20Lee"));
        assert!(html.contains("action=\"/movies/3/review\""));
    }

    #[test]
    fn add_movie_form_offers_every_genre() {
        let html = add_movie_page();
        for genre in Genre::iter() {
            assert!(html.contains(genre.label()));
        }
    }
}
