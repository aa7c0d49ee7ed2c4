//! Rate-aware, cache-backed EVE Swagger Interface client with just-in-time SSO token refresh and
//! error-budget short-circuiting.
//!
//! Every call made through [`esi::EsiClient`] composes three policies in a fixed order: the
//! error-budget pre-check ([`budget::BudgetTracker`]), the signature-keyed response cache
//! ([`cache::ResponseCache`]), and the credential's token refresh ([`auth::Credential`]).

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod budget;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod esi;
pub mod http;
pub mod obs;
pub mod sso;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
