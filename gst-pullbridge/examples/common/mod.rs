// SPDX-FileCopyrightText: 2025 Contributors to the pullbridge project.
// SPDX-License-Identifier: Apache-2.0

//! Common utilities shared across examples.

use tracing::level_filters::LevelFilter;

/// Initializes a stdout tracing subscriber.
///
/// `default` applies unless `RUST_LOG` says otherwise.
pub fn setup_logging(default: LevelFilter) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default.into())
                .from_env_lossy(),
        )
        .init();
}
