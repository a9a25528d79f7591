use oraculo_db::models::Settings;

use crate::reconcile::Verdict;

pub const CYCLE_START: &str = "Manifestando a matriz. Analisando correntes de probabilidade subatômica.";
pub const CYCLE_DONE: &str = "Matriz prevista gerada. Os padrões foram isolados.";
pub const MEMORY_CLEARED: &str = "Memória limpa.";

pub trait Voice {
    fn speak(&mut self, text: &str);
}

pub fn verdict_phrase(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Resonance => "Ressonância absoluta. Meus cálculos colapsaram perfeitamente na realidade.",
        Verdict::Permutation => {
            "Aproximação por permutação detectada. Os dígitos estão corretos, o Oráculo está recalibrando a ordem."
        }
        Verdict::Assimilated => "Ajustes assimilados. Minha inteligência preditiva está se refinando.",
    }
}

/// Speaks only when voice output is enabled in the settings.
pub fn announce(voice: &mut dyn Voice, settings: &Settings, text: &str) {
    if settings.voice_enabled {
        voice.speak(text);
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingVoice {
    pub spoken: Vec<String>,
}

#[cfg(test)]
impl Voice for RecordingVoice {
    fn speak(&mut self, text: &str) {
        self.spoken.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_respects_setting() {
        let mut voice = RecordingVoice::default();
        let mut settings = Settings::default();
        announce(&mut voice, &settings, CYCLE_START);
        settings.voice_enabled = false;
        announce(&mut voice, &settings, CYCLE_DONE);
        assert_eq!(voice.spoken, vec![CYCLE_START.to_string()]);
    }

    #[test]
    fn test_verdict_phrases_distinct() {
        let a = verdict_phrase(Verdict::Resonance);
        let b = verdict_phrase(Verdict::Permutation);
        let c = verdict_phrase(Verdict::Assimilated);
        assert!(a != b && b != c && a != c);
    }
}
