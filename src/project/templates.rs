//! 新規ファイルの雛形

use super::Category;

/// カテゴリごとの雛形を返す
pub fn default_content(category: Category, filename: &str) -> String {
    match category {
        Category::Markup => default_markup(filename),
        Category::Style => default_style().to_string(),
        Category::Script => default_script().to_string(),
    }
}

/// HTML雛形。タイトルはファイル名から作る（`about-us.html` → `about us`）
pub fn default_markup(filename: &str) -> String {
    let title = filename.replace(".html", "").replace(['-', '_'], " ");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="../css/style.css">
    <link rel="preconnect" href="https://fonts.googleapis.com">
    <link rel="preconnect" href="https://fonts.gstatic.com" crossorigin>
    <link href="https://fonts.googleapis.com/css2?family=Borel&display=swap" rel="stylesheet">
</head>
<body>
    <div class="container">
        <h1 class="welcome-screen">hello</h1>
    </div>
    <script src="../js/script.js"></script>
</body>
</html>"#
    )
}

pub fn default_style() -> &'static str {
    r#"body {
    font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
    margin: 0;
    padding: 20px;
    background: linear-gradient(135deg, #002fff 0%, #cc0099 100%);
    min-height: 95.2vh;
    color: white;
    display: flex;
    align-items: center;
    justify-content: center;
}
.welcome-screen{
    font-size: 2.5em;
    font-family: "Borel", cursive;
}
.welcome-screen::selection{
    background: none;
}"#
}

pub fn default_script() -> &'static str {
    r#"document.addEventListener('DOMContentLoaded', () => {
    const title = document.querySelector('h1');
    if (title) {
        title.style.cursor = 'pointer';
        title.addEventListener('click', () => {
            alert('Welcome to setup!');
        });
    }
});"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_title_comes_from_filename() {
        let html = default_markup("about-us_page.html");
        assert!(html.contains("<title>about us page</title>"));
        assert!(html.contains(r#"href="../css/style.css""#));
        assert!(html.contains(r#"src="../js/script.js""#));
    }
}
