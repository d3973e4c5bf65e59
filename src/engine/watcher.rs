//! ログストリームのパターン監視
//!
//! # 責務
//!
//! - 行指向ログストリームから、順序付きパターン列の出現を検出
//! - パターンごとの個別タイムアウト管理（待機開始時点から計測）
//! - ストリーム終了とタイムアウトの区別（[`MatchStatus::NotReached`] と
//!   [`MatchStatus::TimedOut`]）
//!
//! # 動作
//!
//! パターンは宣言順に 1 つずつ消費されます。あるパターンを待っている間に
//! 読み飛ばした行が後続パターンに一致していても、遡って一致扱いには
//! なりません。1 つのパターンがタイムアウトしても監視は中断せず、次の
//! パターンへ新しいタイムアウト予算で進みます。ストリームが終了した
//! 場合は、以降の全パターンが `NotReached` になります。
//!
//! タイムアウトしたパターンの行は破棄されないため、遅れて届いた行が
//! 後続パターンの一致に使われることはあります。
//!
//! # 使用例
//!
//! ```rust
//! use container_poker::engine::watcher;
//! use container_poker::engine::result::MatchStatus;
//! use container_poker::flow::PatternSpec;
//! use container_poker::runtime::LogStream;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut stream = LogStream::from_lines(vec![
//!     "starting up".to_string(),
//!     "ready to accept connections".to_string(),
//! ]);
//! let patterns = vec![PatternSpec::exact("ready", Duration::from_secs(5))];
//!
//! let outcomes = watcher::watch(&mut stream, &patterns).await.unwrap();
//! assert_eq!(outcomes[0].status, MatchStatus::Matched);
//! # }
//! ```

use crate::engine::result::{ExecutionError, MatchOutcome, MatchStatus};
use crate::flow::step::{MatchRule, PatternSpec};
use crate::runtime::LogStream;
use regex::Regex;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};

/// 順序付きパターン列をストリームに対して監視する
///
/// # 引数
///
/// - `stream`: 行指向のログストリーム
/// - `patterns`: 待機するパターン（宣言順に消費される）
///
/// # 戻り値
///
/// - `Ok(Vec<MatchOutcome>)`: パターンごとの結末（入力と同順・同数）
/// - `Err(ExecutionError::InvalidPattern)`: 正規表現パターンが不正
///
/// # 特性
///
/// - 空のパターン列は即座に空の結果を返し、ストリームを一切消費しません
/// - パターンのタイムアウトは、そのパターンの待機を開始した時点から計測されます
/// - ストリームが生きたままタイムアウトした場合は `TimedOut`、一致前に
///   ストリームが閉じた場合は `NotReached` になります
pub async fn watch(
    stream: &mut LogStream,
    patterns: &[PatternSpec],
) -> Result<Vec<MatchOutcome>, ExecutionError> {
    // ストリームを読み始める前に全パターンを検証する
    let matchers = patterns
        .iter()
        .map(|spec| CompiledMatcher::compile(&spec.rule))
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcomes = Vec::with_capacity(patterns.len());
    let mut stream_closed = false;

    for (spec, matcher) in patterns.iter().zip(matchers) {
        let pattern = spec.rule.pattern().to_string();

        if stream_closed {
            outcomes.push(MatchOutcome {
                pattern,
                status: MatchStatus::NotReached,
                matched_line: None,
                captures: Vec::new(),
                elapsed: Duration::ZERO,
            });
            continue;
        }

        debug!(pattern = %pattern, timeout = ?spec.timeout, "パターン待機を開始します");
        let outcome = wait_for_pattern(stream, &pattern, &matcher, spec.timeout).await;
        if outcome.status == MatchStatus::NotReached {
            stream_closed = true;
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// 1 パターン分の待機
///
/// タイムアウト予算は呼び出し時点から計測します。
async fn wait_for_pattern(
    stream: &mut LogStream,
    pattern: &str,
    matcher: &CompiledMatcher,
    budget: Duration,
) -> MatchOutcome {
    let started = Instant::now();
    let deadline = started + budget;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return MatchOutcome {
                pattern: pattern.to_string(),
                status: MatchStatus::TimedOut,
                matched_line: None,
                captures: Vec::new(),
                elapsed: started.elapsed(),
            };
        }

        match timeout(remaining, stream.next_line()).await {
            // 行が届いた: 一致すれば確定、しなければ読み飛ばして次の行へ
            Ok(Some(line)) => {
                if let Some(captures) = matcher.find(&line) {
                    debug!(pattern = %pattern, line = %line, "パターンに一致しました");
                    return MatchOutcome {
                        pattern: pattern.to_string(),
                        status: MatchStatus::Matched,
                        matched_line: Some(line),
                        captures,
                        elapsed: started.elapsed(),
                    };
                }
                trace!(pattern = %pattern, line = %line, "一致しない行を読み飛ばしました");
            }
            // ストリーム終了: このパターンは到達不能
            Ok(None) => {
                return MatchOutcome {
                    pattern: pattern.to_string(),
                    status: MatchStatus::NotReached,
                    matched_line: None,
                    captures: Vec::new(),
                    elapsed: started.elapsed(),
                };
            }
            // 予算切れ: ストリームは生きているのでタイムアウト
            Err(_) => {
                return MatchOutcome {
                    pattern: pattern.to_string(),
                    status: MatchStatus::TimedOut,
                    matched_line: None,
                    captures: Vec::new(),
                    elapsed: started.elapsed(),
                };
            }
        }
    }
}

/// コンパイル済みのパターン照合器
enum CompiledMatcher {
    /// 部分文字列の完全一致
    Exact(String),
    /// 正規表現
    Regex(Regex),
}

impl CompiledMatcher {
    fn compile(rule: &MatchRule) -> Result<Self, regex::Error> {
        match rule {
            MatchRule::Exact(needle) => Ok(Self::Exact(needle.clone())),
            MatchRule::Regex(pattern) => Ok(Self::Regex(Regex::new(pattern)?)),
        }
    }

    /// 行に対する照合
    ///
    /// # 戻り値
    ///
    /// - `Some(captures)`: 一致（キャプチャグループ 1 以降。完全一致では空）
    /// - `None`: 不一致
    fn find(&self, line: &str) -> Option<Vec<String>> {
        match self {
            Self::Exact(needle) => line.contains(needle).then(Vec::new),
            Self::Regex(regex) => regex.captures(line).map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect()
            }),
        }
    }
}
