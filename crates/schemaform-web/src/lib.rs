//! HTML rendering and HTTP plumbing for schemaform.
//!
//! - `form` / `view` / `page`: escaped server-side HTML for a live
//!   [`schemaform_core::FormSession`] and for resolved view entries.
//! - `http`: the signing + raw-transfer upload backend.
//! - `download`: download-proxy URLs and the allow-listed fetch behind them.
//! - `adapters::axum` (feature `axum`): routes serving a form end to end.

#[cfg(feature = "axum")]
pub mod adapters {
    pub mod axum;
}
pub mod download;
pub mod form;
pub mod html;
pub mod http;
pub mod page;
pub mod view;

#[cfg(feature = "axum")]
pub use adapters::axum::{
    AxumFormAdapter, DEFAULT_UPLOAD_LIMIT_BYTES, SubmitHandler, download_router, proxy_download,
};
pub use download::{ProxyError, ProxyPolicy, download_proxy_url};
pub use form::{FormOptions, render_form, render_options};
pub use http::{HttpUploadBackend, UploadEndpoints};
pub use page::{SCHEMAFORM_RUNTIME_JS, Theme, render_page};
pub use view::{ViewOptions, render_view};
