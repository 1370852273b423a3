use crate::{
    api::{LoginRequest, RegisterRequest},
    cli::globals::GlobalArgs,
    format,
    guard::LogoutOptions,
    session::{token, User},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};

const LOGOUT_MESSAGE: &str = "Logout realizado com sucesso.";

#[derive(Debug)]
pub struct Login {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct Register {
    pub globals: GlobalArgs,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
    pub cpf: Option<String>,
    pub telefone: Option<String>,
}

fn print_user(user: &User) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(user)?);
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// # Errors
/// Returns an error if the API rejects the credentials or the session cannot
/// be stored.
#[instrument(skip(args), fields(email = %args.email))]
pub async fn login(args: Login) -> Result<()> {
    let context = args.globals.context("/login")?;
    let credentials = LoginRequest {
        email: args.email.trim().to_string(),
        password: args.password.expose_secret().to_string(),
    };

    let auth = context.client.login(&credentials).await?;
    debug!(state_file = %args.globals.state_file.display(), "session saved");
    print_user(&auth.user)
}

/// Documents are sent without punctuation.
///
/// # Errors
/// Returns an error if the API rejects the registration.
#[instrument(skip(args), fields(email = %args.email))]
pub async fn register(args: Register) -> Result<()> {
    let context = args.globals.context("/signup")?;
    let password = args.password.expose_secret().to_string();
    let payload = RegisterRequest {
        first_name: args.first_name.trim().to_string(),
        last_name: args.last_name.trim().to_string(),
        email: args.email.trim().to_string(),
        password_confirm: password.clone(),
        password,
        cpf: args.cpf.as_deref().map(format::remove_document_formatting),
        telefone: args.telefone.as_deref().map(format::remove_document_formatting),
    };

    let auth = context.client.register(&payload).await?;
    print_user(&auth.user)
}

/// # Errors
/// Returns an error if there is no usable session or the API call fails.
pub async fn profile(globals: GlobalArgs) -> Result<()> {
    let context = globals.context("/dashboard")?;
    let profile = context.client.profile().await?;
    print_user(&profile.user)
}

/// Revokes the refresh token (best effort) and drops the stored session.
///
/// # Errors
/// Returns an error if the session file cannot be read.
pub async fn logout(globals: GlobalArgs) -> Result<()> {
    let context = globals.context("/dashboard")?;
    if context.session.refresh_token()?.is_none() {
        println!("Nenhuma sessão ativa.");
        return Ok(());
    }

    context
        .guard
        .force_logout(LogoutOptions {
            message: Some(LOGOUT_MESSAGE.to_string()),
            ..LogoutOptions::default()
        })
        .await;
    Ok(())
}

/// Prints who is logged in and when the access token expires. With
/// `refresh`, the guard's check runs first and renews a token that is
/// expired or close to expiry.
///
/// # Errors
/// Returns an error if the session file cannot be read.
pub async fn status(globals: GlobalArgs, refresh: bool) -> Result<()> {
    let context = globals.context("/dashboard")?;
    if refresh {
        context.guard.check_auth_state().await;
    }

    let Some(access) = context.session.access_token()? else {
        println!("Sessão: inativa");
        return Ok(());
    };

    match context.session.user()? {
        Some(user) => println!("Usuário: {} <{}>", user.nome_completo, user.email),
        None => println!("Usuário: desconhecido"),
    }

    match token::seconds_until_expiry(access.expose_secret(), token::now_unix()) {
        Ok(remaining) if remaining > 0 => {
            println!("Sessão: ativa");
            println!("Token expira em {remaining}s");
        }
        Ok(_) => println!("Sessão: token expirado"),
        Err(err) => println!("Sessão: token inválido ({err})"),
    }
    Ok(())
}

/// # Errors
/// Returns an error if the backend does not answer successfully.
pub async fn test(globals: GlobalArgs, protected: bool) -> Result<()> {
    let context = globals.context("/")?;
    let body = if protected {
        context
            .client
            .test_protected()
            .await
            .context("protected endpoint check failed")?
    } else {
        context
            .client
            .test_backend()
            .await
            .context("backend check failed")?
    };
    print_json(&body)
}
