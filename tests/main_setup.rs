use kidlearn_api::{
    AppConfig,
    config::{DEFAULT_BIND_ADDR, DEFAULT_DATABASE_URL, DEFAULT_TOKEN_TTL_MINUTES, Env, LOCAL_JWT_SECRET},
};
use serial_test::serial;
use std::{env, panic};

const CONFIG_VARS: [&str; 6] = [
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "TOKEN_TTL_MINUTES",
    "BIND_ADDR",
    "SEED_DEMO_DATA",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with every config variable cleared, restoring the original
/// environment afterward even if the test panics.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        CONFIG_VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals.into_iter().rev() {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
            }
            // JWT_SECRET is missing
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic without JWT_SECRET"
    );
}

#[test]
#[serial]
fn test_app_config_production_rejects_blank_secret() {
    for blank in ["", "   "] {
        let result = run_with_env(|| {
            panic::catch_unwind(|| {
                unsafe {
                    env::set_var("APP_ENV", "production");
                    env::set_var("JWT_SECRET", blank);
                }
                AppConfig::load()
            })
        });
        assert!(result.is_err(), "JWT_SECRET={blank:?} should not pass in production");
    }
}

#[test]
#[serial]
fn test_app_config_local_blank_secret_falls_back() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("JWT_SECRET", "");
        }
        AppConfig::load()
    });

    assert_eq!(config.jwt_secret, LOCAL_JWT_SECRET);
    assert!(config.uses_default_secret());
}

#[test]
#[serial]
fn test_app_config_production_with_secret() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("JWT_SECRET", "a-real-production-secret");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "a-real-production-secret");
    assert!(!config.uses_default_secret());
    // Demo data is opt-in outside local runs.
    assert!(!config.seed_demo_data);
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.db_url, DEFAULT_DATABASE_URL);
    assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    assert_eq!(config.token_ttl_minutes, DEFAULT_TOKEN_TTL_MINUTES);
    assert_eq!(config.jwt_secret, LOCAL_JWT_SECRET);
    assert!(config.uses_default_secret());
    assert!(config.seed_demo_data);
    assert!(!config.uses_memory_store());
}

#[test]
#[serial]
fn test_app_config_reads_overrides() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("DATABASE_URL", "memory");
            env::set_var("TOKEN_TTL_MINUTES", "30");
            env::set_var("BIND_ADDR", "127.0.0.1:9999");
            env::set_var("SEED_DEMO_DATA", "false");
        }
        AppConfig::load()
    });

    assert!(config.uses_memory_store());
    assert_eq!(config.token_ttl_minutes, 30);
    assert_eq!(config.token_config().ttl, chrono::Duration::minutes(30));
    assert_eq!(config.bind_addr, "127.0.0.1:9999");
    assert!(!config.seed_demo_data);
}

#[test]
#[serial]
fn test_app_config_rejects_bad_ttl() {
    for bad in ["0", "-5", "soon"] {
        let result = run_with_env(|| {
            panic::catch_unwind(|| {
                unsafe {
                    env::set_var("TOKEN_TTL_MINUTES", bad);
                }
                AppConfig::load()
            })
        });
        assert!(result.is_err(), "TOKEN_TTL_MINUTES={bad} should be rejected");
    }
}

#[test]
fn test_debug_output_redacts_secret() {
    let config = AppConfig::default();
    let rendered = format!("{:?}", config);
    assert!(!rendered.contains(&config.jwt_secret));
    assert!(rendered.contains("<redacted>"));
}
