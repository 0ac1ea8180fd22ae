//! Разбор строки ввода на токены.
//!
//! Разделитель — только незаключённый в кавычки пробел. Кавычки `"` и `'`
//! открывают область, которая закрывается той же кавычкой; другая кавычка
//! внутри неё — обычный символ. Экранирования нет.
//!
//! Незакрытая кавычка ошибкой не считается: остаток строки становится
//! содержимым последнего токена. Это разрешающее и иногда неожиданное
//! поведение, поэтому [`scan`] сообщает о нём отдельно.

use tracing::debug;

/// Результат разбора строки.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scan {
    /// Токены в порядке появления
    pub tokens: Vec<String>,
    /// Кавычка, оставшаяся открытой в конце строки
    pub unterminated: Option<char>,
}

/// Разбирает строку и сообщает о незакрытой кавычке.
pub fn scan(line: &str) -> Scan {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == ' ' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    Scan {
        tokens,
        unterminated: quote,
    }
}

/// Разбирает строку на токены.
pub fn tokenize(line: &str) -> Vec<String> {
    let scan = scan(line);
    if let Some(q) = scan.unterminated {
        debug!(quote = %q, "Unterminated quote, treating the rest of the line as literal");
    }
    scan.tokens
}

/// Собирает строку, которую [`tokenize`] разберёт обратно в те же токены.
///
/// Токены с пробелами или кавычками заключаются в кавычки того вида, которого
/// в токене нет. Токен, содержащий оба вида кавычек, так не выразить.
pub fn quote_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            if !token.contains([' ', '"', '\'']) {
                token.to_string()
            } else if token.contains('"') {
                format!("'{token}'")
            } else {
                format!("\"{token}\"")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
