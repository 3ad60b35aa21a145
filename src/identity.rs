use std::fmt;

/// A connected player account. The game only reads its address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account {
    pub address: String,
}

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

pub trait IdentityProvider {
    fn current_account(&self) -> Option<Account>;
}

/// An identity fixed at startup: either a known account or none.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity {
    account: Option<Account>,
}

impl StaticIdentity {
    pub fn connected(account: Account) -> Self {
        Self {
            account: Some(account),
        }
    }

    pub fn disconnected() -> Self {
        Self { account: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_account(&self) -> Option<Account> {
        self.account.clone()
    }
}

/// `0x1234...abcd`: first six and last four characters.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn short_address__keeps_head_and_tail() {
        let actual = short_address("0x530561712247f71c361c14555ac789c6790ce24a");
        assert_eq!(actual, "0x5305...e24a");
    }

    #[test]
    fn account__display__full_address() {
        let account = Account::new("0x530561712247f71c361c14555ac789c6790ce24a");
        assert_eq!(
            account.to_string(),
            "0x530561712247f71c361c14555ac789c6790ce24a"
        );
        assert_eq!(account.short_address(), "0x5305...e24a");
    }

    #[test]
    fn short_address__short_input__unchanged() {
        assert_eq!(short_address("0xabc"), "0xabc");
    }
}
