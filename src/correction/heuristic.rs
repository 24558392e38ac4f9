use super::{Correction, CorrectionError, CorrectionItem, CorrectionSource, Corrector, Tone};

/// Offline corrector for mechanical fixes only
///
/// Collapses whitespace, capitalizes the pronoun "I" and the first word, and
/// ends the sentence with punctuation. Grammar is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCorrector;

impl HeuristicCorrector {
    pub fn apply(&self, text: &str) -> Correction {
        let mut corrections = Vec::new();

        let words: Vec<String> = text
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();
                if lower == "i" || lower.starts_with("i'") {
                    let fixed = format!("I{}", &word[1..]);
                    if fixed != word {
                        corrections.push(CorrectionItem {
                            original: word.to_string(),
                            corrected: fixed.clone(),
                            explanation: "The pronoun \"I\" is always capitalized".to_string(),
                        });
                    }
                    fixed
                } else {
                    word.to_string()
                }
            })
            .collect();

        let mut corrected = words.join(" ");
        if corrected.is_empty() {
            return Correction {
                corrected,
                corrections,
                source: CorrectionSource::Heuristic,
            };
        }

        if let Some(first) = corrected.chars().next() {
            if first.is_lowercase() {
                let capitalized: String = first.to_uppercase().chain(corrected.chars().skip(1)).collect();
                corrections.push(CorrectionItem {
                    original: words[0].clone(),
                    corrected: capitalized.split(' ').next().unwrap_or_default().to_string(),
                    explanation: "Sentences start with a capital letter".to_string(),
                });
                corrected = capitalized;
            }
        }

        if !corrected.ends_with(['.', '!', '?']) {
            corrected.push('.');
            corrections.push(CorrectionItem {
                original: String::new(),
                corrected: ".".to_string(),
                explanation: "Sentences end with punctuation".to_string(),
            });
        }

        Correction {
            corrected,
            corrections,
            source: CorrectionSource::Heuristic,
        }
    }
}

#[async_trait::async_trait]
impl Corrector for HeuristicCorrector {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn correct(&self, text: &str, _: &str, _: Tone) -> Result<Correction, CorrectionError> {
        Ok(self.apply(text))
    }
}
