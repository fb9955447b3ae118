use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use crate::error::{PathError, PathResult};

/// Resolves a path string that may contain environment variables.
///
/// Expands `$VAR` and `${VAR}`, replaces a leading `~` with the home directory and
/// joins relative results onto the current working directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] if a `${` has no matching `}`
///
/// # Example
///
/// ```
/// use depot_utils::error::PathResult;
/// use depot_utils::path::resolve_path;
///
/// fn main() -> PathResult<()> {
///     let resolved = resolve_path("$HOME/mirror/catalog.db")?;
///     println!("Resolved path is {:#?}", resolved);
///     Ok(())
/// }
/// ```
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();

    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let path_buf = PathBuf::from(expand_variables(path)?);

    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path_buf))
            .map_err(|err| PathError::CurrentDir { source: err })
    }
}

/// Returns `$HOME`, falling back to `/home/$USER`.
pub fn home_dir() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
        let user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        PathBuf::from(format!("/home/{user}"))
    })
}

/// Returns `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns `$XDG_DATA_HOME`, defaulting to `$HOME/.local/share`.
pub fn xdg_data_home() -> PathBuf {
    env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns the directory prefix a registry uses to shard `name`.
///
/// | length | prefix |
/// |---|---|
/// | 1 | `1` |
/// | 2 | `2` |
/// | 3 | `3/{first char}` |
/// | 4+ | `{chars 1-2}/{chars 3-4}` |
///
/// # Example
///
/// ```
/// use depot_utils::path::shard_prefix;
///
/// assert_eq!(shard_prefix("abc"), "3/a");
/// assert_eq!(shard_prefix("serde"), "se/rd");
/// ```
pub fn shard_prefix(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => String::new(),
        1 => "1".to_string(),
        2 => "2".to_string(),
        3 => format!("3/{}", chars[0]),
        _ => {
            let first: String = chars[..2].iter().collect();
            let second: String = chars[2..4].iter().collect();
            format!("{first}/{second}")
        }
    }
}

fn expand_variables(path: &str) -> PathResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let var_name = consume_until_brace(&mut chars)?;
                expand_env_var(&var_name, &mut result, path)?;
            }
            '$' => {
                let var_name = consume_var_name(&mut chars);
                if var_name.is_empty() {
                    result.push('$');
                } else {
                    expand_env_var(&var_name, &mut result, path)?;
                }
            }
            '~' if result.is_empty() => result.push_str(&home_dir().to_string_lossy()),
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn consume_until_brace(chars: &mut Peekable<Chars>) -> PathResult<String> {
    let mut var_name = String::new();

    for c in chars.by_ref() {
        if c == '}' {
            return Ok(var_name);
        }
        var_name.push(c);
    }

    Err(PathError::UnclosedVariable {
        input: format!("${{{var_name}"),
    })
}

fn consume_var_name(chars: &mut Peekable<Chars>) -> String {
    let mut var_name = String::new();
    while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
        var_name.push(c);
    }
    var_name
}

fn expand_env_var(var_name: &str, result: &mut String, original: &str) -> PathResult<()> {
    // XDG vars fall back to their defaults instead of failing.
    let value = match var_name {
        "HOME" => home_dir().to_string_lossy().into_owned(),
        "XDG_CONFIG_HOME" => xdg_config_home().to_string_lossy().into_owned(),
        "XDG_DATA_HOME" => xdg_data_home().to_string_lossy().into_owned(),
        _ => {
            env::var(var_name).map_err(|_| PathError::MissingEnvVar {
                input: original.into(),
                var: var_name.into(),
            })?
        }
    };
    result.push_str(&value);
    Ok(())
}
