//! Console command parsing

use fitgate_core::{EditingField, OAuthStrategy};

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    SignIn {
        email: String,
        password: Option<String>,
    },
    Biometric,
    OAuth(OAuthStrategy),
    SignOut,
    DeleteAccount,
    ChangeEmail(String),
    Code(String),
    Cancel,
    SignUp {
        email: String,
        password: Option<String>,
    },
    Forgot(String),
    Reset {
        email: String,
        code: String,
        password: Option<String>,
    },
    Edit {
        field: EditingField,
        value: String,
    },
    Clear(EditingField),
    Profile,
    Workouts,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  status                          show auth state and route
  sign-in <email> [password]      password sign-in
  biometric                       sign in with the cached credential
  oauth <google|apple|github>     OAuth sign-in
  sign-out                        log out (OAuth sessions soft-lock)
  delete-account                  delete the signed-in account
  change-email <address>          start a primary email change
  sign-up <email> [password]      create an account
  code <code>                     submit the emailed code
  cancel                          abandon the pending email change or sign-up
  forgot <email>                  request a password reset code
  reset <email> <code> [password] set a new password
  edit <name|username|phone|avatar> <value>
  clear <name|username|phone|avatar>
  profile                         show the signed-in account
  workouts                        show the workout calendar
  help                            this text
  quit";

impl Command {
    /// Parse a trimmed, non-empty input line
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = words.collect();

        let arg = |i: usize, what: &str| -> Result<String, String> {
            args.get(i)
                .map(|s| s.to_string())
                .ok_or_else(|| format!("{} requires {}", name, what))
        };
        let opt = |i: usize| args.get(i).map(|s| s.to_string());

        let command = match name {
            "status" => Command::Status,
            "sign-in" | "login" => Command::SignIn {
                email: arg(0, "an email")?,
                password: opt(1),
            },
            "biometric" | "bio" => Command::Biometric,
            "oauth" => Command::OAuth(arg(0, "a provider")?.parse()?),
            "sign-out" | "logout" => Command::SignOut,
            "delete-account" => Command::DeleteAccount,
            "change-email" => Command::ChangeEmail(arg(0, "an email")?),
            "code" => Command::Code(arg(0, "a code")?),
            "cancel" => Command::Cancel,
            "sign-up" => Command::SignUp {
                email: arg(0, "an email")?,
                password: opt(1),
            },
            "forgot" => Command::Forgot(arg(0, "an email")?),
            "reset" => Command::Reset {
                email: arg(0, "an email")?,
                code: arg(1, "a code")?,
                password: opt(2),
            },
            "edit" => {
                let field = parse_field(&arg(0, "a field")?)?;
                if args.len() < 2 {
                    return Err("edit requires a value".to_string());
                }
                Command::Edit {
                    field,
                    value: args[1..].join(" "),
                }
            }
            "clear" => Command::Clear(parse_field(&arg(0, "a field")?)?),
            "profile" => Command::Profile,
            "workouts" => Command::Workouts,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command: {} (try `help`)", other)),
        };

        Ok(command)
    }
}

fn parse_field(name: &str) -> Result<EditingField, String> {
    match name {
        "name" => Ok(EditingField::Name),
        "username" => Ok(EditingField::Username),
        "phone" => Ok(EditingField::Phone),
        "avatar" => Ok(EditingField::Avatar),
        other => Err(format!("unknown profile field: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sign_in() {
        assert_eq!(
            Command::parse("sign-in alice@example.com Secret1!").unwrap(),
            Command::SignIn {
                email: "alice@example.com".to_string(),
                password: Some("Secret1!".to_string()),
            }
        );
        assert_eq!(
            Command::parse("login alice@example.com").unwrap(),
            Command::SignIn {
                email: "alice@example.com".to_string(),
                password: None,
            }
        );
    }

    #[test]
    fn test_parse_oauth() {
        assert_eq!(
            Command::parse("oauth google").unwrap(),
            Command::OAuth(OAuthStrategy::Google)
        );
        assert!(Command::parse("oauth myspace").is_err());
        assert!(Command::parse("oauth").is_err());
    }

    #[test]
    fn test_parse_edit_joins_value() {
        assert_eq!(
            Command::parse("edit name Mary Ann").unwrap(),
            Command::Edit {
                field: EditingField::Name,
                value: "Mary Ann".to_string(),
            }
        );
        assert!(Command::parse("edit name").is_err());
        assert!(Command::parse("clear account").is_err());
    }

    #[test]
    fn test_parse_reset() {
        assert_eq!(
            Command::parse("reset bob@x.com 123456").unwrap(),
            Command::Reset {
                email: "bob@x.com".to_string(),
                code: "123456".to_string(),
                password: None,
            }
        );
        assert!(Command::parse("reset bob@x.com").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("dance").unwrap_err();
        assert!(err.contains("unknown command"));
    }
}
