//! Blackboard — mapa de variáveis de um ciclo de amostragem
//!
//! Cada ciclo cria um [`Blackboard`] novo (ou semeado com constantes), que é
//! mutado pelo dispositivo e pelos módulos de cálculo e descartado depois de
//! entregue ao sink.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Valor numérico de uma variável do blackboard
///
/// Tipado para que erros de tipo apareçam em tempo de compilação, mas aberto
/// o suficiente para que qualquer sensor publique qualquer chave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Booleano (entradas digitais, flags)
    Bool(bool),
    /// Inteiro (contagens, índices, códigos brutos)
    Int(i64),
    /// Ponto flutuante (grandezas físicas calibradas)
    Float(f64),
}

impl Value {
    /// Converte para `f64` (booleanos viram 0.0 / 1.0)
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    /// Retorna o inteiro, se o valor for inteiro ou booleano
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(i64::from(b)),
            Value::Int(i) => Some(i),
            Value::Float(_) => None,
        }
    }

    /// Valor é ponto flutuante?
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Mapa papel lógico → chave no blackboard
///
/// Ex.: `{ "T" = "temperature", "P" = "pressure" }`. Cada dispositivo ou
/// módulo de cálculo define seus papéis.
pub type Variables = BTreeMap<String, String>;

/// Chave configurada para `role`, ou `default`
pub fn variable_or(variables: &Variables, role: &str, default: &str) -> String {
    variables
        .get(role)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Blackboard: nome da variável → valor
///
/// Chaves únicas; a ordem de inserção é irrelevante (a iteração é ordenada
/// por chave para saída determinística).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blackboard {
    entries: BTreeMap<String, Value>,
}

impl Blackboard {
    /// Cria blackboard vazio
    pub fn new() -> Self {
        Self::default()
    }

    /// Insere (ou sobrescreve) uma variável, retornando o valor anterior
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Insere apenas se a chave ainda não existir
    ///
    /// Retorna `true` se o valor foi inserido.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value.into());
        true
    }

    /// Lê uma variável
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).copied()
    }

    /// Lê uma variável como `f64`
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).map(|v| v.as_f64())
    }

    /// Remove uma variável
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Chave presente?
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Número de variáveis
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Blackboard vazio?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Itera pelas chaves em ordem
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Itera pelos pares (chave, valor) em ordem
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Funde `other` sobre `self` (última escrita vence)
    pub fn merge(&mut self, other: Blackboard) {
        self.entries.extend(other.entries);
    }

    /// Funde `defaults` sem sobrescrever chaves existentes
    ///
    /// Equivale a `{...defaults, ...self}`.
    pub fn merge_defaults(&mut self, defaults: &Blackboard) {
        for (key, value) in &defaults.entries {
            self.entries.entry(key.clone()).or_insert(*value);
        }
    }

    /// Retorna cópia com todas as chaves prefixadas
    pub fn prefixed(&self, prefix: &str) -> Blackboard {
        self.entries
            .iter()
            .map(|(k, v)| (format!("{}{}", prefix, k), *v))
            .collect()
    }

    /// Consome e retorna o mapa interno
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.entries
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Blackboard {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Blackboard {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.entries.insert(k.into(), v.into());
        }
    }
}

impl IntoIterator for Blackboard {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<BTreeMap<String, Value>> for Blackboard {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }
}
