//! tether CLI - drives the C ABI the way a foreign caller would.
//!
//! Arguments go in as C strings, results come back as owned handles that are
//! read and then released exactly once. Useful as a smoke test for a
//! deployment's configuration and service.

mod args;

use std::ffi::{CStr, CString, c_char};
use std::process::ExitCode;
use std::ptr;

use anyhow::{Context, Result};
use clap::Parser;

use args::{CallArgs, Cli, Command};
use tether::TetherText;
use tether_config::TetherConfig;
use tether_types::{CallSite, status};

type Entry = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    f64,
    i32,
    *mut *mut TetherText,
    *mut *mut TetherText,
) -> i32;

fn entry_for(site: CallSite) -> Entry {
    match site {
        CallSite::Inference => tether::tether_generate,
        CallSite::ModelInvocation => tether::tether_invoke_model,
        CallSite::CredentialIssuance => tether::tether_issue_credential,
    }
}

/// Copy a handle's text out and release the handle.
fn take_text(handle: *mut TetherText) -> String {
    // SAFETY: `handle` came from an entry point and is released exactly once here.
    unsafe {
        let len = tether::tether_text_len(handle);
        let data = tether::tether_text_ptr(handle);
        let text = if data.is_null() {
            String::new()
        } else {
            String::from_utf8_lossy(std::slice::from_raw_parts(data.cast::<u8>(), len)).into_owned()
        };
        tether::tether_text_release(handle);
        text
    }
}

fn run_call(site: CallSite, args: &CallArgs) -> Result<ExitCode> {
    let input = CString::new(args.input.as_str()).context("input contains a NUL byte")?;
    let instructions = args
        .instructions
        .as_deref()
        .map(CString::new)
        .transpose()
        .context("instructions contain a NUL byte")?;

    let mut payload = ptr::null_mut();
    let mut error = ptr::null_mut();
    // SAFETY: every pointer is valid for the duration of the call.
    let code = unsafe {
        entry_for(site)(
            input.as_ptr(),
            instructions.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
            args.temperature,
            args.max_tokens,
            &mut payload,
            &mut error,
        )
    };

    if code == status::SUCCESS {
        println!("{}", take_text(payload));
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("error (status {code}): {}", take_text(error));
        Ok(ExitCode::FAILURE)
    }
}

fn run_status() {
    for site in CallSite::all() {
        let open = tether::tether_is_available(site.id()) == 1;
        println!(
            "{:<12} {}",
            site.as_str(),
            if open { "available" } else { "unavailable" }
        );
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = TetherConfig::load();
    let log_file = config.as_ref().ok().and_then(TetherConfig::log_file);
    tether::init_tracing("info", log_file);
    if let Err(e) = &config {
        tracing::warn!("{e}");
    }

    match &cli.command {
        Command::Generate(args) => run_call(CallSite::Inference, args),
        Command::Invoke(args) => run_call(CallSite::ModelInvocation, args),
        Command::Credential(args) => run_call(CallSite::CredentialIssuance, args),
        Command::Status => {
            run_status();
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            // SAFETY: static NUL-terminated string owned by the library.
            let version = unsafe { CStr::from_ptr(tether::tether_version()) };
            println!("tether {}", version.to_string_lossy());
            Ok(ExitCode::SUCCESS)
        }
    }
}
