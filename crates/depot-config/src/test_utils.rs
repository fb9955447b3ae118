use std::env;

/// Restores the previous values of overridden variables on drop, even if the test panics.
struct EnvGuard(Vec<(String, Option<String>)>);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.0.drain(..) {
            match old {
                Some(v) => env::set_var(&key, v),
                None => env::remove_var(&key),
            }
        }
    }
}

/// Runs `f` with `vars` set. Callers must be `#[serial]`.
pub fn with_env<F>(vars: Vec<(&str, &str)>, f: F)
where
    F: FnOnce(),
{
    let _guard = EnvGuard(
        vars.iter()
            .map(|(k, _)| (k.to_string(), env::var(k).ok()))
            .collect(),
    );

    for (key, value) in &vars {
        env::set_var(key, value);
    }

    f();
}
