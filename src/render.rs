//! Template rendering.
//!
//! Page templates live under `<templates_dir>/website/` and use Jinja
//! syntax, which is also what [`crate::context::strip_markup`] removes when
//! the same files feed the chatbot context.

use axum::response::Html;
use minijinja::{path_loader, Environment};
use serde::Serialize;
use std::path::Path;

use crate::error::SiteResult;

pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    /// Loads templates lazily from `templates_dir`.
    pub fn new(templates_dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir));
        Self { env }
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> SiteResult<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Renders `website/<page>` into an HTML response.
    pub fn page<S: Serialize>(&self, page: &str, ctx: S) -> SiteResult<Html<String>> {
        self.render(&format!("website/{}", page), ctx).map(Html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use tempfile::TempDir;

    #[test]
    fn renders_from_website_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("website")).unwrap();
        std::fs::write(
            dir.path().join("website/hello.html"),
            "<h1>{{ hero.headline }}</h1>{% for s in services %}<li>{{ s }}</li>{% endfor %}",
        )
        .unwrap();

        let renderer = Renderer::new(dir.path());
        let html = renderer
            .page(
                "hello.html",
                context! { hero => context! { headline => "Hi" }, services => vec!["a", "b"] },
            )
            .unwrap();
        assert_eq!(html.0, "<h1>Hi</h1><li>a</li><li>b</li>");
    }

    #[test]
    fn missing_template_is_an_error() {
        let dir = TempDir::new().unwrap();
        let renderer = Renderer::new(dir.path());
        assert!(renderer.page("nope.html", context! {}).is_err());
    }
}
