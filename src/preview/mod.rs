//! プレビュー合成
//!
//! エントリHTMLから `../css/` と `../js/` への相対参照を探し、
//! 対応するファイルの現在の内容をインライン化した単一の文書を作る

pub mod surface;

pub use surface::{MemorySurface, PreviewHost, RenderSurface, SurfaceHandle};

use crate::project::{Category, ProjectFiles};
use regex::{Captures, Regex, RegexBuilder};
use std::sync::OnceLock;

fn stylesheet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r#"<link[^>]*href=["']\.\./css/([^"']+)["'][^>]*>"#)
            .case_insensitive(true)
            .build()
            .expect("stylesheet pattern is valid")
    })
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        RegexBuilder::new(r#"<script[^>]*src=["']\.\./js/([^"']+)["'][^>]*>\s*</script>"#)
            .case_insensitive(true)
            .build()
            .expect("script pattern is valid")
    })
}

/// プレビュー文書を合成する。HTMLファイルが無ければ `None`
///
/// 同じ入力に対して常にバイト単位で同じ結果を返す
pub fn compose(files: &ProjectFiles) -> Option<String> {
    let entry = files.entry_filename()?;
    let document = files.content(Category::Markup, entry)?;
    Some(inline_references(document, files))
}

/// 文書中の相対参照をインライン化する。未知のファイル名はタグをそのまま残す
pub fn inline_references(document: &str, files: &ProjectFiles) -> String {
    let styled = stylesheet_pattern().replace_all(document, |caps: &Captures<'_>| {
        match files.content(Category::Style, &caps[1]) {
            Some(css) => format!("<style>{}</style>", css),
            None => caps[0].to_string(),
        }
    });

    script_pattern()
        .replace_all(&styled, |caps: &Captures<'_>| {
            match files.content(Category::Script, &caps[1]) {
                Some(js) => format!("<script>{}</script>", js),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(html: &str) -> ProjectFiles {
        let mut files = ProjectFiles::default();
        files.html.insert("index.html".to_string(), html.to_string());
        files
            .css
            .insert("style.css".to_string(), "body{color:red}".to_string());
        files
            .js
            .insert("script.js".to_string(), "console.log(1)".to_string());
        files
    }

    #[test]
    fn test_inlines_stylesheet_and_script() {
        let files = files(
            r#"<head><link href="../css/style.css"></head><body><script src="../js/script.js"></script></body>"#,
        );
        let output = compose(&files).unwrap();
        assert_eq!(
            output,
            "<head><style>body{color:red}</style></head><body><script>console.log(1)</script></body>"
        );
    }

    #[test]
    fn test_attribute_order_and_quotes() {
        let files = files(
            "<LINK href='../css/style.css' rel='stylesheet' /><script type=\"module\" src='../js/script.js' defer></script>",
        );
        let output = compose(&files).unwrap();
        assert_eq!(
            output,
            "<style>body{color:red}</style><script>console.log(1)</script>"
        );
    }

    #[test]
    fn test_unrelated_references_pass_through() {
        let html = concat!(
            r#"<link href="https://fonts.googleapis.com/css2?family=Borel" rel="stylesheet">"#,
            r#"<link href="css/style.css">"#,
            r#"<link href="../css/missing.css">"#,
            r#"<script src="https://cdn.example.com/lib.js"></script>"#,
            r#"<script src="../js/notification.js"></script>"#,
        );
        let files = files(html);
        assert_eq!(compose(&files).unwrap(), html);
    }

    #[test]
    fn test_no_markup_means_no_preview() {
        let mut files = files("");
        files.html.clear();
        assert_eq!(compose(&files), None);
    }

    #[test]
    fn test_prefers_index_html() {
        let mut files = files("<p>index</p>");
        files
            .html
            .insert("about.html".to_string(), "<p>about</p>".to_string());
        assert_eq!(compose(&files).unwrap(), "<p>index</p>");

        files.html.remove("index.html");
        assert_eq!(compose(&files).unwrap(), "<p>about</p>");
    }

    #[test]
    fn test_replacement_text_is_literal() {
        let mut files = files(r#"<script src="../js/script.js"></script>"#);
        files
            .js
            .insert("script.js".to_string(), "const price = '$1 $0';".to_string());
        assert_eq!(
            compose(&files).unwrap(),
            "<script>const price = '$1 $0';</script>"
        );
    }
}
