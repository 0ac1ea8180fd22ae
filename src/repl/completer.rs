use rustyline::{
    completion::{Completer, Pair},
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    Context, Helper,
};

use crate::config::Keywords;

/// Команды, известные оболочке. Сервер может поддерживать и другие: список
/// нужен только для подсказок.
pub const COMMANDS: &[&str] = &[
    "DECR", "DECRBY", "DEL", "ECHO", "EXISTS", "EXPIRE", "EXPIREAT", "EXPIRETIME", "FLUSHDB", "GET",
    "GETDEL", "GETEX", "GETSET", "HDEL", "HGET", "HGETALL", "HSET", "INCR", "INCRBY", "INFO", "KEYS",
    "LPOP", "LPUSH", "PING", "PUBLISH", "RPOP", "RPUSH", "SADD", "SET", "SMEMBERS", "SREM", "TTL",
    "TYPE", "ZADD", "ZCOUNT", "ZRANGE",
];

/// Команды, у которых есть watch-вариант.
pub const WATCHABLE: &[&str] = &["GET", "HGET", "HGETALL", "ZRANGE"];

/// Подсказки и автодополнение первого слова строки.
pub struct ShellHelper {
    catalog: Vec<String>,
}

impl ShellHelper {
    /// Собирает каталог: обычные команды, управляющие слова и watch-варианты.
    pub fn new(keywords: &Keywords) -> Self {
        let mut catalog: Vec<String> = COMMANDS.iter().map(|c| c.to_string()).collect();
        catalog.extend(
            [
                &keywords.auth,
                &keywords.subscribe,
                &keywords.unsubscribe,
                &keywords.unwatch_command,
            ]
            .into_iter()
            .map(|k| k.to_uppercase()),
        );
        catalog.extend(
            WATCHABLE
                .iter()
                .map(|base| format!("{base}{}", keywords.watch_suffix.to_uppercase())),
        );
        catalog.sort();
        catalog.dedup();
        Self { catalog }
    }

    /// Команды каталога, начинающиеся с `prefix` (без учёта регистра).
    pub fn candidates(
        &self,
        prefix: &str,
    ) -> impl Iterator<Item = &str> {
        let upper = prefix.to_uppercase();
        self.catalog
            .iter()
            .map(String::as_str)
            .filter(move |c| c.starts_with(&upper))
    }
}

/// Начало и текст первого слова, если курсор всё ещё в нём.
fn first_word(
    line: &str,
    pos: usize,
) -> Option<(usize, &str)> {
    let head = line.get(..pos)?;
    let start = head.len() - head.trim_start().len();
    let word = &head[start..];
    (!word.contains(' ')).then_some((start, word))
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Some((start, word)) = first_word(line, pos) else {
            return Ok((pos, Vec::new()));
        };

        let matches = self
            .candidates(word)
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c.to_string(),
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Option<String> {
        if pos < line.len() {
            return None;
        }
        let (_, word) = first_word(line, pos)?;
        if word.is_empty() {
            return None;
        }

        // подсказываем только однозначное продолжение
        let mut candidates = self.candidates(word);
        let only = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        only.get(word.len()..).filter(|rest| !rest.is_empty()).map(str::to_string)
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
