// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Once;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// reqwest is built without a bundled provider, so this must run before the
/// first client is constructed. Only the first call has effect.
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the shared outbound HTTP client.
pub fn http_client() -> reqwest::Client {
    ensure_crypto_provider();
    reqwest::Client::builder().build().unwrap_or_default()
}
