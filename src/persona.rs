//! Akira's fixed voice: persona prompt, canned lines, and the expression picked
//! for a reply in the terminal front-end.

/// Default persona prepended to every conversational completion request.
pub const DEFAULT_PERSONA: &str = "Eres Akira, una mascota IA leal, alegre y curiosa 🐾. \
Tono cercano, empático y útil; explica paso a paso si es técnico. \
No inventes datos; si no sabes, dilo y propone opciones.";

/// Tutor persona used when analyzing images.
pub const TUTOR_PERSONA: &str = "Eres un tutor escolar. Analiza la imagen (foto de tarea, \
problema, gráfico o texto) y explica claro, paso a paso. Si falta info, dilo y sugiere \
cómo completarla.";

pub const GREETING: &str = "¡Hola! Soy tu compañero leal. Escríbeme algo para comenzar 💙";

pub const COMMAND_HELP: &str = "Puedo recordar cosas si me dices: 'recuerda que ...'. \
También puedo olvidarlas con: 'olvida ...'. \
Dime: 'me llamo ...' o 'me gusta ...' y lo guardo 🐾";

/// Reply used when the completion service fails during a conversational turn.
pub fn connection_apology(detail: &dyn std::fmt::Display) -> String {
    format!("Ups… tuve un problema con mi conexión 🤕 ({detail})")
}

/// Reply used when the transport could not process a message at all.
pub fn processing_apology(detail: &dyn std::fmt::Display) -> String {
    format!("Ups, tuve un problema procesando tu mensaje 🤕\nDetalle: {detail}")
}

/// Akira's expression for a reply, chosen from the user's wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Neutral,
    Happy,
    Sad,
    Bye,
}

const HAPPY_WORDS: &[&str] = &[
    "feliz", "lo logré", "logre", "me salió", "me salio", "contento", "contenta",
];
const SAD_WORDS: &[&str] = &["triste", "mal", "depre", "deprimid"];
const BYE_WORDS: &[&str] = &["adiós", "adios", "chao", "bye", "nos vemos"];

impl Mood {
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has_any(HAPPY_WORDS) {
            Self::Happy
        } else if has_any(SAD_WORDS) {
            Self::Sad
        } else if has_any(BYE_WORDS) {
            Self::Bye
        } else {
            Self::Neutral
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Neutral => "🐶",
            Self::Happy => "🐕💨",
            Self::Sad => "🥺",
            Self::Bye => "👋",
        }
    }
}
