//! Security-focused tests across the public API.
//!
//! These tests verify:
//! 1. Envelopes reject tampering, wrong passphrases and truncation
//! 2. Hash strings reject malformed input without panicking
//! 3. The unlock throttle gates attempts before any key derivation
//! 4. Generated secrets meet their policy and rank above weak ones
//! 5. Configuration survives a TOML round trip

use hushkit_core::envelope::{EnvelopeMetadata, SealedEnvelope};
use hushkit_core::password_hash::HashSafety;
use hushkit_core::*;

const PASSPHRASE: &str = "correct horse battery staple";

/// Cheap parameters so debug builds stay fast.
const FAST: KdfProfile = KdfProfile::Custom(KdfParams::Pbkdf2Sha256 { iterations: 1_000 });

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sealed(plaintext: &[u8]) -> SealedEnvelope {
    seal(PASSPHRASE, plaintext, EnvelopeMetadata::default(), &FAST, &[]).unwrap()
}

// ============================================================================
// 1. Envelope Security Tests
// ============================================================================

#[test]
fn test_wrong_passphrase_fails_open() {
    init_logging();
    let blob = seal_text(PASSPHRASE, "attack at dawn", &FAST).unwrap();

    let result = open_text("wrong horse battery staple", &blob);
    assert_eq!(result, Err(HushError::Authentication));

    assert_eq!(open_text(PASSPHRASE, &blob).unwrap(), "attack at dawn");
}

#[test]
fn test_empty_passphrase_round_trip() {
    let blob = seal_text("", "note", &FAST).unwrap();
    assert_eq!(open_text("notempty", &blob), Err(HushError::Authentication));
    assert_eq!(open_text("", &blob).unwrap(), "note");
}

#[test]
fn test_tampered_regions_fail_authentication() {
    let envelope = sealed(b"sixteen byte msg");
    let bytes = envelope.to_bytes();
    let header_len = envelope.header().to_bytes().unwrap().len();
    let salt_offset = 3 + 1 + 1 + 4 + 1;
    let nonce_offset = salt_offset + 16;
    let ct_offset = header_len + 4;

    let regions = [
        ("salt", salt_offset),
        ("nonce", nonce_offset),
        ("ciphertext", ct_offset),
        ("tag", bytes.len() - 1),
    ];
    for (region, index) in regions {
        let mut tampered = bytes.clone();
        tampered[index] ^= 0xFF;
        let parsed = SealedEnvelope::from_bytes(&tampered)
            .unwrap_or_else(|e| panic!("{} flip should still parse: {}", region, e));
        let result = open(PASSPHRASE, &parsed, &[]);
        assert_eq!(
            result.map(|p| p.to_vec()),
            Err(HushError::Authentication),
            "tampered {} must fail authentication",
            region
        );
    }
}

#[test]
fn test_tampered_kdf_parameters_fail() {
    let envelope = sealed(b"payload");
    let mut bytes = envelope.to_bytes();
    // Low byte of the big-endian iteration count
    bytes[8] ^= 0x01;
    let parsed = SealedEnvelope::from_bytes(&bytes).unwrap();
    assert_ne!(parsed.header().kdf, envelope.header().kdf);
    assert!(open(PASSPHRASE, &parsed, &[]).is_err());
}

#[test]
fn test_truncated_envelope_is_format_error() {
    let bytes = sealed(b"some secret payload").to_bytes();
    for len in [0, 3, 10, 30, bytes.len() / 2, bytes.len() - 1] {
        let result = SealedEnvelope::from_bytes(&bytes[..len]);
        assert!(
            matches!(result, Err(HushError::Format(_))),
            "truncation to {} bytes should be a format error, got {:?}",
            len,
            result
        );
    }
}

#[test]
fn test_malformed_armor_does_not_panic() {
    let inputs = [
        "",
        "hk1.",
        "hk1.!!!!",
        "hk2.AAAA",
        "not an envelope",
        "hk1.SEtF",
        "hk1.SEtFAQEAAAPo",
    ];
    for input in inputs {
        let result = open_text(PASSPHRASE, input);
        assert!(
            matches!(result, Err(HushError::Format(_))),
            "{:?} should be a format error, got {:?}",
            input,
            result
        );
    }
}

#[test]
fn test_metadata_and_aad_are_bound() {
    let metadata = EnvelopeMetadata {
        mime: Some("application/pdf".to_string()),
        name: Some("will.pdf".to_string()),
    };
    let sealed = seal_bytes_with_aad(PASSPHRASE, b"%PDF-1.7", metadata.clone(), &FAST, b"vault:1")
        .unwrap();

    let opened = open_bytes_with_aad(PASSPHRASE, &sealed.blob, b"vault:1").unwrap();
    assert_eq!(opened.plaintext, b"%PDF-1.7");
    assert_eq!(opened.header.metadata, metadata);

    assert_eq!(
        open_bytes_with_aad(PASSPHRASE, &sealed.blob, b"vault:2").map(|o| o.plaintext),
        Err(HushError::Authentication)
    );
    assert_eq!(
        open_bytes(PASSPHRASE, &sealed.blob).map(|o| o.plaintext),
        Err(HushError::Authentication)
    );
}

#[test]
fn test_same_input_never_repeats_salt_or_nonce() {
    let a = sealed(b"same");
    let b = sealed(b"same");
    assert_ne!(a.header().salt, b.header().salt);
    assert_ne!(a.header().nonce, b.header().nonce);
    assert_ne!(hex::encode(a.to_bytes()), hex::encode(b.to_bytes()));
}

// ============================================================================
// 2. Password Hash Security Tests
// ============================================================================

#[test]
fn test_unsupported_hash_formats() {
    for input in [
        "not-a-hash",
        "",
        "$",
        "$md5$abc$def",
        "$sha256$$",
        "$pbkdf2-sha256$i=abc$AAECAwQFBgcICQoLDA0ODw$AAAA",
        "$pbkdf2-sha256$i=0$AAECAwQFBgcICQoLDA0ODw$AAAA",
        "$argon2id$v=16$m=1024,t=1,p=1$AAECAwQFBgcICQoLDA0ODw$AAAA",
    ] {
        match parse_password_hash(input) {
            Err(HushError::Format(msg)) => assert!(
                msg.contains("unsupported hash format"),
                "{:?}: unexpected message {}",
                input,
                msg
            ),
            other => panic!("{:?} should be rejected, got {:?}", input, other),
        }
        assert!(verify_password("anything", input).is_err());
    }
}

#[test]
fn test_legacy_hash_verifies_with_known_vector() {
    let salt = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let hashed = hash_password("hunter2", &HashOptions::new(HashScheme::Sha256).with_salt(salt))
        .unwrap();
    assert_eq!(
        hashed.encoded,
        "$sha256$AAECAwQFBgcICQoLDA0ODw$6NHhhQeGF1exNnTy6dDpFJ7WZn9DKtW4Ig+cBJop3FQ"
    );
    assert!(verify_password("hunter2", &hashed.encoded).unwrap());
    assert!(!verify_password("hunter3", &hashed.encoded).unwrap());

    let assessment = assess_password_hash_choice(&HashScheme::Sha256);
    assert_eq!(assessment.safety, HashSafety::Weak);
}

#[test]
fn test_pbkdf2_hash_round_trip() {
    let options = HashOptions::new(HashScheme::Pbkdf2Sha256 { iterations: 1_000 });
    let first = hash_password("s3cret!", &options).unwrap();
    let second = hash_password("s3cret!", &options).unwrap();
    assert_ne!(first.encoded, second.encoded, "salts must differ");
    assert!(verify_password("s3cret!", &first.encoded).unwrap());
    assert!(verify_password("s3cret!", &second.encoded).unwrap());
    assert_eq!(parse_password_hash(&first.encoded).unwrap(), first.record);
}

// ============================================================================
// 3. Unlock Throttle Tests
// ============================================================================

/// What a vault unlock screen does: gate, then decrypt, then update state.
fn attempt_unlock(
    state: UnlockThrottleState,
    blob: &str,
    passphrase: &str,
    now: u64,
) -> (UnlockThrottleState, std::result::Result<String, &'static str>) {
    if is_unlock_blocked(&state, now) {
        return (state, Err("blocked"));
    }
    match open_text(passphrase, blob) {
        Ok(plaintext) => (clear_unlock_failures(), Ok(plaintext)),
        Err(_) => (apply_unlock_failure(state, now), Err("wrong passphrase")),
    }
}

#[test]
fn test_escalation_scenario() {
    init_logging();
    let t: u64 = 1_700_000_000_000;

    let mut state = create_unlock_throttle_state();
    for _ in 0..3 {
        state = apply_unlock_failure(state, t);
    }
    assert!(should_require_human_check(&state));

    let mut state = create_unlock_throttle_state();
    for _ in 0..5 {
        state = apply_unlock_failure(state, t);
    }
    assert!(is_unlock_blocked(&state, t));
    assert_eq!(
        remaining_lockout_ms(&state, t),
        cooldown_seconds_for_failure_count(5) * 1000
    );
}

#[test]
fn test_blocked_attempt_never_reaches_decrypt() {
    let blob = seal_text(PASSPHRASE, "vault contents", &FAST).unwrap();
    let t: u64 = 1_700_000_000_000;

    let mut state = create_unlock_throttle_state();
    for _ in 0..3 {
        let (next, result) = attempt_unlock(state, &blob, "guess", t);
        assert_eq!(result, Err("wrong passphrase"));
        state = next;
    }
    assert!(is_unlock_blocked(&state, t));

    // Even the right passphrase is refused while locked out, and the state
    // does not change.
    let (same, result) = attempt_unlock(state, &blob, PASSPHRASE, t + 1_000);
    assert_eq!(result, Err("blocked"));
    assert_eq!(same, state);

    let after = t + remaining_lockout_ms(&state, t);
    let (cleared, result) = attempt_unlock(state, &blob, PASSPHRASE, after);
    assert_eq!(result, Ok("vault contents".to_string()));
    assert_eq!(cleared, create_unlock_throttle_state());
}

#[test]
fn test_human_check_is_single_use() {
    let challenge = create_human_check_challenge().unwrap();
    assert!(challenge.prompt().starts_with("What is "));
    let answer = (challenge.left + challenge.right).to_string();
    assert!(verify_human_check(challenge, &answer));
    // `challenge` has been consumed; a second verification needs a new one.
    let fresh = create_human_check_challenge().unwrap();
    assert!(!verify_human_check(fresh, "not a number"));
}

// ============================================================================
// 4. Secret Generation Tests
// ============================================================================

#[test]
fn test_generated_passwords_hold_policy() {
    let constraints = HardeningConstraints {
        length: 24,
        min_unique_chars: 14,
        ..HardeningConstraints::default()
    };
    for _ in 0..100 {
        let pw = generate_password(&constraints).unwrap();
        assert!(constraints.is_satisfied_by(&pw), "{} violates policy", pw);
    }
}

#[test]
fn test_impossible_policy_is_configuration_error() {
    let constraints = HardeningConstraints {
        length: 6,
        min_unique_chars: 7,
        ..HardeningConstraints::default()
    };
    assert!(matches!(
        generate_password(&constraints),
        Err(HushError::Configuration(_))
    ));
}

#[test]
fn test_entropy_ranks_generated_above_weak() {
    let weak = analyze_secret("password");
    let generated = analyze_secret(&generate_password(&HardeningConstraints::default()).unwrap());
    let phrase = analyze_secret(&generate_passphrase(&PassphraseSettings::default()).unwrap());

    assert_eq!(weak.strength, SecretStrength::Dangerous);
    assert!(generated.strength >= SecretStrength::Strong, "{:?}", generated);
    assert!(phrase.strength >= SecretStrength::Strong, "{:?}", phrase);
    assert!(generated.effective_entropy_bits > weak.effective_entropy_bits);
    assert!(estimate_passphrase_entropy(&PassphraseSettings::default()) > 100.0);
}

// ============================================================================
// 5. Configuration
// ============================================================================

#[test]
fn test_config_round_trip_drives_operations() {
    let config = HushConfig::from_toml_str(
        r#"
[envelope.profile.custom]
algorithm = "pbkdf2-sha256"
iterations = 2000

[generator]
length = 16
min_unique_chars = 10

[passphrase]
words = 4
separator = "."

[throttle]
challenge_threshold = 1
lockout_threshold = 2
base_cooldown_secs = 5
max_cooldown_secs = 60
"#,
    )
    .unwrap();
    config.validate().unwrap();

    let reparsed = HushConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
    assert_eq!(reparsed, config);

    let blob = seal_text(PASSPHRASE, "configured", &config.envelope.profile).unwrap();
    let header = SealedEnvelope::from_armored(&blob).unwrap().header().clone();
    assert_eq!(header.kdf, KdfParams::Pbkdf2Sha256 { iterations: 2000 });

    let pw = generate_password(&config.generator).unwrap();
    assert_eq!(pw.chars().count(), 16);
    let phrase = generate_passphrase(&config.passphrase).unwrap();
    assert_eq!(phrase.split('.').count(), 4);

    let state = config.throttle.apply_failure(create_unlock_throttle_state(), 0);
    assert!(config.throttle.should_require_human_check(&state));
    let state = config.throttle.apply_failure(state, 0);
    assert_eq!(state.remaining_lockout_ms(0), 5_000);
}
