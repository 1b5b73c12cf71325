use axum::response::Html;

const LANDING_PAGE: &str = include_str!("../../public/index.html");

/// `GET /` — static landing page exercising the gateway from a browser.
pub async fn index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}
