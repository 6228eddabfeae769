//! Credential store integration: issuing, refreshing and revoking credentials.

pub mod issuer;
pub mod qr;

pub use issuer::{CredentialIssuer, IssueError, IssuedCredential};
pub use qr::{RenderError, render_svg};
