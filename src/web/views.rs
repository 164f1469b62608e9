use askama::Template;
use askama_web::WebTemplate;

/// Home page: the name form plus the generated meme once it arrives.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate;
