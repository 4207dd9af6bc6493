//! Generate a VAPID key pair for the relay.
//!
//! Usage: `vapid-keygen [subject]`

use duet_core::VapidIdentity;
use rand::rngs::OsRng;
use std::process::ExitCode;

fn main() -> ExitCode {
    let (subject, show_subject_note) = match std::env::args().nth(1) {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
        eprintln!("subject must be a mailto: or https: URI, got {subject:?}");
        return ExitCode::FAILURE;
    }

    let identity = match VapidIdentity::generate(&mut OsRng, subject.as_str()) {
        Ok(identity) => identity,
        Err(err) => {
            eprintln!("failed to generate VAPID key pair: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("VAPID key pair generated.");
    println!();
    println!("VAPID_PRIVATE_KEY=\"{}\"", identity.private_key_base64url());
    println!("VAPID_PUBLIC_KEY=\"{}\"", identity.public_key_base64url());
    println!("VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace VAPID_SUBJECT with a contact URI you control.");
    }
    ExitCode::SUCCESS
}
