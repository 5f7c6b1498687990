//! End-to-end tests for the template URL manager
//!
//! Local templates live in a temp directory; GitHub templates are served by an
//! in-process axum server standing in for the raw-content host.

use axum::{http::header, routing::get, Router};
use hypergen::config::HypergenConfig;
use hypergen::manager::TemplateUrlManager;
use hypergen::resolver::{GitHubResolver, ResolutionErrorKind, UrlType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Helper to serve `router` on an ephemeral port
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(dir: &TempDir) -> HypergenConfig {
    let mut config = HypergenConfig::default();
    config.cache.dir = dir.path().join("cache");
    config.security.require_https = false;
    config
}

async fn github_manager(dir: &TempDir, hits: Arc<AtomicUsize>) -> TemplateUrlManager {
    let router = Router::new().route(
        "/acme/widgets/v2/forms/template.yml",
        get(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                ([(header::ETAG, "\"v2-forms\"")], "name: forms\n")
            }
        }),
    );
    let base = serve(router).await;

    let config = config(dir);
    let github = GitHubResolver::new(config.security.clone(), Duration::from_secs(5))
        .with_raw_base(base)
        .with_scratch_dir(dir.path().join("scratch"));

    let mut manager = TemplateUrlManager::new(config);
    manager.add_resolver(UrlType::Github, Arc::new(github));
    manager
}

#[tokio::test]
async fn test_github_template_is_fetched_once_then_cached() {
    let dir = TempDir::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let manager = github_manager(&dir, Arc::clone(&hits)).await;

    let first = manager.resolve_url("github:acme/widgets@v2/forms", None).await.unwrap();
    let second = manager.resolve_url("github:acme/widgets@v2/forms", None).await.unwrap();

    assert_eq!(first.content, "name: forms\n");
    assert_eq!(first.metadata.etag.as_deref(), Some("\"v2-forms\""));
    assert_eq!(second, first);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let info = manager.get_cache_info().await.unwrap();
    assert_eq!(info.entry_count, 1);
    assert_eq!(info.total_size, 12);
    assert!((info.hit_rate - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_corrupted_cache_entry_triggers_refetch() {
    let dir = TempDir::new().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let manager = github_manager(&dir, Arc::clone(&hits)).await;
    let url = "github:acme/widgets@v2/forms";

    manager.resolve_url(url, None).await.unwrap();
    std::fs::write(manager.cache().entry_dir(url).join("template.yml"), "tampered").unwrap();
    assert!(!manager.validate_cache().await.unwrap().is_valid());

    let resolved = manager.resolve_url(url, None).await.unwrap();
    assert_eq!(resolved.content, "name: forms\n");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(manager.validate_cache().await.unwrap().is_valid());
}

#[tokio::test]
async fn test_mixed_batch() {
    let dir = TempDir::new().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir_all(templates.join("local-form")).unwrap();
    std::fs::write(templates.join("local-form/template.yaml"), "name: local\n").unwrap();

    let manager = github_manager(&dir, Arc::new(AtomicUsize::new(0))).await;
    let urls = ["local-form", "github:acme/widgets@v2/forms", "github:acme/widgets@v2/missing"];

    let settled = manager.resolve_multiple_settled(&urls, Some(templates.as_path())).await;
    assert_eq!(settled[0].as_ref().unwrap().content, "name: local\n");
    assert_eq!(settled[1].as_ref().unwrap().metadata.version.as_deref(), Some("v2"));
    assert!(settled[2].as_ref().unwrap_err().is_not_found());

    let err = manager.resolve_multiple(&urls, Some(templates.as_path())).await.unwrap_err();
    assert_eq!(err.kind(), &ResolutionErrorKind::NotFound);
    assert_eq!(err.url, "github:acme/widgets@v2/missing");
}

#[tokio::test]
async fn test_blocked_github_is_rejected_before_any_request() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.security.blocked_domains = vec!["github.com".to_string()];

    let err = TemplateUrlManager::new(config)
        .resolve_url("github:acme/widgets", None)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), ResolutionErrorKind::Forbidden(_)));
}
