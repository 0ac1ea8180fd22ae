use serde::{Deserialize, Serialize};

/// Команда оболочки: имя в верхнем регистре и упорядоченные аргументы.
///
/// Неизменяема после создания. Создаётся на каждую введённую строку и
/// поглощается транспортом.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "cmd")]
    name: String,
    args: Vec<String>,
}

impl Command {
    /// Создаёт команду, приводя имя к верхнему регистру.
    pub fn new<N, I, A>(
        name: N,
        args: I,
    ) -> Self
    where
        N: AsRef<str>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            name: name.as_ref().to_uppercase(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Собирает команду из токенов строки: первый токен — имя, остальные —
    /// аргументы. Пустой список токенов команды не образует.
    pub fn from_tokens(tokens: Vec<String>) -> Option<Self> {
        let mut iter = tokens.into_iter();
        let name = iter.next()?;
        Some(Self::new(name, iter))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Краткое описание для логов: имя и число аргументов, без значений.
    pub fn summary(&self) -> String {
        format!("{} ({} args)", self.name, self.args.len())
    }
}

impl std::fmt::Display for Command {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
