//! Resolver and payload fixtures backed by a wiremock server

use std::sync::Arc;

use async_trait::async_trait;
use music_dl::{Config, DownloadManager, MusicItem, Quality, UrlResolver};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Deterministic fake audio payload
pub fn audio_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Resolves every item to `<server>/audio/<id>/<quality>`
pub struct ServerResolver {
    pub base: String,
}

#[async_trait]
impl UrlResolver for ServerResolver {
    async fn resolve(
        &self,
        item: &MusicItem,
        quality: Quality,
    ) -> music_dl::Result<Option<String>> {
        Ok(Some(format!(
            "{}/audio/{}/{}",
            self.base,
            item.id,
            quality.code()
        )))
    }
}

/// Serve `body` for `id` at `quality`
pub async fn mount_audio(server: &MockServer, id: &str, quality: Quality, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/audio/{}/{}", id, quality.code())))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Manager using the real HTTP transport against `server`
pub fn http_manager(server: &MockServer, temp_dir: &TempDir) -> DownloadManager {
    let mut config = Config::default();
    config.settings.save_dir = temp_dir.path().join("music");
    config.max_concurrent_downloads = 2;

    DownloadManager::new(
        config,
        Arc::new(ServerResolver {
            base: server.uri(),
        }),
    )
    .unwrap()
}
