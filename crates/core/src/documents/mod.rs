//! Remote document services.
//!
//! Two SOAP services back the pipeline: one lists the official documents of
//! a case file, the other returns the PDF of a single document on behalf of
//! a requesting user. Both require a bearer token from the token service.
//!
//! The [`DocumentService`] trait is what the pipeline depends on;
//! [`SoapDocumentService`] is the production implementation.

mod error;
mod soap;
mod token;
mod traits;

pub use error::DocumentError;
pub use soap::SoapDocumentService;
pub use token::HttpTokenProvider;
pub use traits::{DocumentService, TokenProvider};
