use rand::Rng;

const TOKEN_LENGTH: usize = 32;

/// Opaque identifier embedded in a delivery's beacon URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct TrackingToken(String);

impl TrackingToken {
    pub fn generate() -> TrackingToken {
        let mut rng = rand::thread_rng();

        let token = std::iter::repeat_with(|| rng.sample(rand::distributions::Alphanumeric))
            .map(char::from)
            .take(TOKEN_LENGTH)
            .collect();

        Self(token)
    }

    pub fn parse(token: String) -> Result<TrackingToken, String> {
        let is_valid =
            token.len() == TOKEN_LENGTH && token.chars().all(|c| c.is_ascii_alphanumeric());

        if !is_valid {
            return Err(format!("{} is not a valid tracking token", token));
        }

        Ok(Self(token))
    }
}

impl AsRef<str> for TrackingToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
