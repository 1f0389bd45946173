//! Auth-flow state command handlers.
//!
//! Persistent and session storage are JSON files under the storage dir, so a
//! "session" lasts until `layup auth end-session`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use layup_core::auth::{AuthFlowState, AuthStateStore, AuthStatus, UrlQuery};
use layup_core::clock::{Clock, SystemClock};
use layup_core::config::Config;
use layup_core::storage::FileStorage;
use tracing::debug;

pub struct SaveOptions {
    pub action: String,
    pub account: Option<String>,
    pub status: String,
    pub expires_in: Option<u64>,
    pub expires_at: Option<i64>,
    pub session_only: bool,
}

fn open_store(config: &Config, url: Option<&str>) -> Result<AuthStateStore> {
    let location = match url {
        Some(url) => {
            UrlQuery::from_location(url).with_context(|| format!("parse location '{url}'"))?
        }
        None => UrlQuery::empty(),
    };

    let persistent = FileStorage::new(config.local_storage_path());
    let session = FileStorage::new(config.session_storage_path());
    debug!(
        persistent = %persistent.path().display(),
        session = %session.path().display(),
        "Opening auth storage"
    );
    Ok(AuthStateStore::new(Arc::new(persistent), Arc::new(session)).with_location(location))
}

pub fn show(config: &Config, url: Option<&str>, strict: bool, json: bool) -> Result<()> {
    let store = open_store(config, url)?;
    let state = if strict {
        store.try_get().context("read auth flow state")?
    } else {
        store.get()
    };

    let Some(state) = state else {
        println!("No auth flow state.");
        return Ok(());
    };

    if json {
        let mut value = serde_json::to_value(&state).context("serialize auth flow state")?;
        if let (Some(map), Some(source)) = (value.as_object_mut(), state.source) {
            map.insert("source".to_string(), source.as_str().into());
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let now_ms = SystemClock.now_millis();
    // Non-string values of known fields live in `extra`; print them as JSON.
    let field = |v: Option<&str>, name: &str| match (v, state.extra.get(name)) {
        (Some(v), _) => v.to_string(),
        (None, Some(raw)) => raw.to_string(),
        (None, None) => "-".to_string(),
    };

    println!(
        "Source:      {}",
        state.source.map_or("-", |source| source.as_str())
    );
    println!(
        "Status:      {}",
        field(state.status.as_ref().map(AuthStatus::as_str), "status")
    );
    println!("Action:      {}", field(state.action.as_deref(), "action"));
    println!("Account:     {}", field(state.account.as_deref(), "account"));
    println!("Expires:     {}", describe_expiry(&state, now_ms));
    println!(
        "Verified at: {}",
        field(state.verified_at.as_deref(), "verified_at")
    );
    Ok(())
}

fn describe_expiry(state: &AuthFlowState, now_ms: i64) -> String {
    let Some(expires) = state.expires_at.as_ref().filter(|e| !e.is_unset()) else {
        return "never".to_string();
    };

    let status = if state.is_live_at(now_ms) {
        "active"
    } else {
        "expired"
    };
    match expires
        .deadline_millis()
        .and_then(DateTime::from_timestamp_millis)
    {
        Some(at) => format!("{} ({status})", at.to_rfc3339()),
        None => format!("{expires} (unreadable, {status})"),
    }
}

pub fn save(config: &Config, opts: &SaveOptions) -> Result<()> {
    let store = open_store(config, None)?;
    let clock = SystemClock;

    let mut state = AuthFlowState {
        status: Some(AuthStatus::from(opts.status.clone())),
        action: Some(opts.action.clone()),
        account: opts.account.clone(),
        ..AuthFlowState::default()
    }
    .verified_on(clock.now());

    if let Some(secs) = opts.expires_in {
        state = state.expiring_in(Duration::from_secs(secs), &clock);
    } else if let Some(ms) = opts.expires_at {
        state = state.with_expires_at(ms);
    }

    let persistent = config.auth.persistent && !opts.session_only;
    store
        .try_save(&state, persistent)
        .context("save auth flow state")?;

    let scope = if persistent {
        "persistent + session"
    } else {
        "session only"
    };
    println!("Saved auth flow state for '{}' ({scope})", opts.action);
    Ok(())
}

pub fn check(config: &Config, action: &str, url: Option<&str>) -> Result<()> {
    let store = open_store(config, url)?;
    if store.is_valid(action) {
        println!("Auth flow state is valid for '{action}'");
        Ok(())
    } else {
        anyhow::bail!("Auth flow state is not valid for '{action}'")
    }
}

pub fn clear(config: &Config) -> Result<()> {
    open_store(config, None)?
        .try_clear()
        .context("clear auth flow state")?;
    println!("Cleared auth flow state");
    Ok(())
}

pub fn end_session(config: &Config) -> Result<()> {
    let session = FileStorage::new(config.session_storage_path());
    session
        .clear()
        .with_context(|| format!("remove {}", session.path().display()))?;
    println!("Ended session");
    Ok(())
}
