use aliri_braid::braid;
use std::fmt;

/// Number of leading characters an alternate `Debug` rendering may show
const PEEK_LEN: usize = 6;

macro_rules! redacted {
    ($ty:ty: $label:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    write!(f, "\"{}\" ({} bytes)", Peek(&self.0), self.0.len())
                } else {
                    f.write_str(concat!("<", $label, ">"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str(&self.0)
                } else {
                    f.write_str(concat!("<", $label, ">"))
                }
            }
        }
    };
}

/// Shows the start of a secret, never the whole of it
struct Peek<'a>(&'a str);

impl fmt::Display for Peek<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.char_indices().nth(PEEK_LEN) {
            Some((idx, _)) => {
                f.write_str(&self.0[..idx])?;
                f.write_str("…")
            }
            None if self.0.is_empty() => Ok(()),
            None => f.write_str("…"),
        }
    }
}

/// The OAuth2 client identifier carried in the access token's `client_id` claim
#[braid(serde)]
pub struct ClientId;

/// A bearer access token issued by the identity provider
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

redacted!(AccessTokenRef: "access token");

/// A refresh token used to obtain a new access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

redacted!(RefreshTokenRef: "refresh token");
