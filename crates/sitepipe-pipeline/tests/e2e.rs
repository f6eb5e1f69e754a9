//! End-to-end tests for the develop and produce pipelines.
//!
//! Each test lays out a small site in a temporary directory using the
//! default source layout and runs the assembled pipeline over it.

use std::{fs, path::Path};

use sitepipe_core::{BuildMode, Config, Layout};
use sitepipe_pipeline::{Job, JobOutcome, Pipeline, StageKind};
use tempfile::TempDir;

const RELOAD_CLIENT: &str = r#"<script src="/__livereload.js"></script>"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/scss/_base.scss", "body { margin: 0; }");
    write(
        root,
        "src/scss/a.scss",
        "@import 'base';\n.used { color: red; }\n.unused { color: blue; }\n",
    );
    write(root, "src/js/app.js", "window.app = true;\n");
    write(root, "src/js/vendor/lib.js", "window.lib = true;\n");
    write(root, "src/partials/_footer.html", "<footer>{{ title }}</footer>");
    write(
        root,
        "src/index.html",
        "<html><body><div class=\"used\"></div>{% include \"partials/_footer.html\" %}</body></html>",
    );
    dir
}

fn pipeline(root: &Path, mode: BuildMode) -> Pipeline {
    let mut config = Config::default();
    config
        .templates
        .vars
        .insert("title".to_string(), "Demo".to_string());
    let layout = Layout::new(root, &config, mode);
    Pipeline::new(&config, layout, Some(RELOAD_CLIENT))
}

#[tokio::test]
async fn test_develop_builds_every_stage() {
    let dir = site();
    let report = pipeline(dir.path(), BuildMode::Develop).run().await.unwrap();

    assert!(report.is_clean());
    let dist = dir.path().join("dist");
    assert!(dist.join("css/styles.css").exists());
    assert!(dist.join("js/scripts.js").exists());

    let html = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(html.contains("<footer>Demo</footer>"));
    assert!(html.contains(&format!("{RELOAD_CLIENT}</body>")));
    assert!(!dist.join("partials/_footer.html").exists());

    let css = fs::read_to_string(dist.join("css/styles.css")).unwrap();
    assert!(css.contains(".unused"));
}

#[tokio::test]
async fn test_produce_purges_unused_selectors() {
    let dir = site();
    pipeline(dir.path(), BuildMode::Produce).run().await.unwrap();

    let css = fs::read_to_string(dir.path().join("build/css/styles.css")).unwrap();
    assert!(css.contains(".used{color:red}"));
    assert!(!css.contains(".unused"));

    let html = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
    assert!(!html.contains(RELOAD_CLIENT));
}

#[tokio::test]
async fn test_produce_keeps_classes_supplied_by_template_vars() {
    let dir = site();
    let root = dir.path();
    write(root, "src/scss/theme.scss", ".theme-dark, .theme-light { color: white; }");
    write(
        root,
        "src/index.html",
        "<html><body class=\"{{ body_class }}\"><div class=\"used\"></div></body></html>",
    );
    let mut config = Config::default();
    config
        .templates
        .vars
        .insert("body_class".to_string(), "theme-dark".to_string());
    let layout = Layout::new(root, &config, BuildMode::Produce);

    Pipeline::new(&config, layout, None).run().await.unwrap();

    let html = fs::read_to_string(root.join("build/index.html")).unwrap();
    assert!(html.contains(r#"<body class="theme-dark">"#));
    let css = fs::read_to_string(root.join("build/css/styles.css")).unwrap();
    assert!(css.contains(".theme-dark{color:#fff}"));
    assert!(!css.contains("theme-light"));
}

#[tokio::test]
async fn test_vendor_scripts_precede_app_scripts() {
    let dir = site();
    pipeline(dir.path(), BuildMode::Develop).run().await.unwrap();

    let js = fs::read_to_string(dir.path().join("dist/js/scripts.js")).unwrap();
    let lib = js.find("window.lib").unwrap();
    let app = js.find("window.app").unwrap();
    assert!(lib < app);
    assert_eq!(js.matches("window.lib").count(), 1);
}

#[tokio::test]
async fn test_produce_removes_stale_files() {
    let dir = site();
    write(dir.path(), "build/old/stale.html", "stale");

    pipeline(dir.path(), BuildMode::Produce).run().await.unwrap();

    assert!(!dir.path().join("build/old/stale.html").exists());
    assert!(dir.path().join("build/index.html").exists());
}

#[tokio::test]
async fn test_produce_aborts_on_template_error() {
    let dir = site();
    write(dir.path(), "src/broken.html", "<p>{{ title </p>");

    let err = pipeline(dir.path(), BuildMode::Produce).run().await.unwrap_err();

    assert!(err.is_transform());
    assert!(err.to_string().contains("broken.html"));
}

#[tokio::test]
async fn test_develop_template_error_keeps_previous_output() {
    let dir = site();
    let develop = pipeline(dir.path(), BuildMode::Develop);
    develop.run().await.unwrap();

    let index = dir.path().join("dist/index.html");
    let before = fs::read_to_string(&index).unwrap();
    let templates = develop.stage(StageKind::Templates).unwrap();

    write(dir.path(), "src/index.html", "<body>{% include </body>");
    let outcome = templates.run().unwrap();
    assert!(matches!(outcome, JobOutcome::Recovered(ref m) if m.contains("index.html")));
    assert_eq!(fs::read_to_string(&index).unwrap(), before);

    write(dir.path(), "src/index.html", "<body>fixed {{ mode }}</body>");
    let outcome = templates.run().unwrap();
    assert!(matches!(outcome, JobOutcome::Succeeded(_)));
    let after = fs::read_to_string(&index).unwrap();
    assert!(after.starts_with("<body>fixed develop"));
}

#[tokio::test]
async fn test_develop_recovers_from_style_error() {
    let dir = site();
    write(dir.path(), "src/scss/broken.scss", ".a { color: ");

    let report = pipeline(dir.path(), BuildMode::Develop).run().await.unwrap();

    let recovered: Vec<_> = report.recovered().map(|r| r.name.as_str()).collect();
    assert_eq!(recovered, vec!["styles"]);
    assert!(dir.path().join("dist/index.html").exists());
}
