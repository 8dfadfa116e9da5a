/// Supplies the bearer credential attached to authenticated calls.
///
/// Injected into every network-calling component so call sites stay
/// testable without a live session, and so no endpoint ends up with its
/// own embedded token.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> String;
}

/// Credential taken from configuration at startup.
pub struct ConfiguredToken {
    token: String,
}

impl ConfiguredToken {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl CredentialProvider for ConfiguredToken {
    fn bearer_token(&self) -> String {
        self.token.clone()
    }
}
