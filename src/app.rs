use crate::completion::CompletionClient;
use crate::config::{AppConfig, HTTPConfig};
use crate::http::{create_app, HttpState};
use crate::relay::Relay;
use crate::telegram::TelegramClient;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct AppHandles {
    server: JoinHandle<()>,
}
impl AppHandles {
    pub async fn new(config: AppConfig) -> Result<AppHandles> {
        let credentials = config.credentials;

        let completion = CompletionClient::new(config.completion, credentials.completion_api_key)
            .context("Failed to build completion HTTP client")?;
        let telegram = TelegramClient::new(&config.telegram, credentials.telegram_bot_token)
            .context("Failed to build Telegram HTTP client")?;

        if let Some(public_url) = &config.telegram.public_url {
            Self::register_webhook(&telegram, public_url, credentials.webhook_secret.as_deref())
                .await;
        }

        let relay = Relay::new(completion, telegram, config.telegram.max_message_length);
        let state = HttpState {
            relay,
            webhook_secret: credentials.webhook_secret,
        };

        Ok(AppHandles {
            server: Self::start_http_server(config.http, state),
        })
    }

    /// Runs until the HTTP server stops or Ctrl-C is received.
    pub async fn run(self) {
        info!("Starting task: HTTP Server");
        let mut server = self.server;

        tokio::select! {
            result = &mut server => match result {
                Ok(()) => error!("HTTP Server task completed!"),
                Err(e) => error!("HTTP Server task failed: {e:?}!"),
            },
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl-C, shutting down"),
                    Err(e) => error!("Failed to listen for Ctrl-C: {e}"),
                }
                server.abort();
            }
        }
    }

    async fn register_webhook(telegram: &TelegramClient, public_url: &str, secret: Option<&str>) {
        let url = format!("{}/webhook", public_url.trim_end_matches('/'));
        match telegram.set_webhook(&url, secret).await {
            Ok(true) => info!("Registered webhook {url}"),
            Ok(false) => warn!("Bot API did not confirm webhook registration for {url}"),
            Err(e) => error!("Failed to register webhook {url}: {e}"),
        }
    }

    fn start_http_server(config: HTTPConfig, state: HttpState) -> JoinHandle<()> {
        let address = config.address;
        let tls_config = config.tls;
        let app = create_app(state);

        tokio::spawn(async move {
            let result = match tls_config {
                Some(_tls_config) => {
                    #[cfg(any(feature = "tls-rustls", feature = "tls-native"))]
                    {
                        info!("Starting HTTPS (secure) server on {address}");

                        #[cfg(feature = "tls-rustls")]
                        {
                            let _ = rustls::crypto::CryptoProvider::install_default(
                                rustls::crypto::aws_lc_rs::default_provider(),
                            );
                            match axum_server::tls_rustls::RustlsConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            )
                            .await
                            {
                                Ok(tls) => axum_server::bind_rustls(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::Error::from(e)
                                    .context("Failed to load rustls TLS certificates")),
                            }
                        }

                        #[cfg(all(feature = "tls-native", not(feature = "tls-rustls")))]
                        {
                            match axum_server::tls_openssl::OpenSSLConfig::from_pem_file(
                                &_tls_config.certificate_path,
                                &_tls_config.key_path,
                            ) {
                                Ok(tls) => axum_server::bind_openssl(address, tls)
                                    .serve(app.into_make_service())
                                    .await
                                    .map_err(anyhow::Error::from),
                                Err(e) => Err(anyhow::Error::from(e)
                                    .context("Failed to load openssl TLS certificates")),
                            }
                        }
                    }

                    #[cfg(not(any(feature = "tls-rustls", feature = "tls-native")))]
                    Err(anyhow::anyhow!(
                        "HTTP Server TLS configuration provided but no TLS features enabled. Compile with a TLS backend feature!"
                    ))
                }
                None => {
                    info!("Starting HTTP (insecure) server on {address}");
                    axum_server::bind(address)
                        .serve(app.into_make_service())
                        .await
                        .map_err(anyhow::Error::from)
                }
            };

            if let Err(e) = result {
                error!("Server error: {e:?}");
            }
        })
    }
}
