//! Multilingual support: language resolution, localized message catalog,
//! wake/sleep phrase lists, and code-mixed transcript normalization.
//!
//! Detection is deterministic and layered: Unicode-script evidence wins,
//! then alias/keyword lookup, then the caller's current preference. The
//! message catalog carries every user-facing template in all supported
//! languages; a handful of backend-originated messages are English-only.

use serde::{Deserialize, Serialize};

/// Languages the receptionist can speak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English (default).
    #[default]
    En,
    /// Tamil.
    Ta,
    /// Telugu.
    Te,
    /// Hindi.
    Hi,
}

impl Language {
    /// All supported languages, in catalog order.
    pub const ALL: [Self; 4] = [Self::En, Self::Ta, Self::Te, Self::Hi];

    /// ISO 639-1 code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ta => "ta",
            Self::Te => "te",
            Self::Hi => "hi",
        }
    }

    /// English display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ta => "Tamil",
            Self::Te => "Telugu",
            Self::Hi => "Hindi",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::En => 0,
            Self::Ta => 1,
            Self::Te => 2,
            Self::Hi => 3,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Code and spoken-name aliases accepted when resolving a language label.
const LANGUAGE_ALIASES: &[(&str, Language)] = &[
    ("en", Language::En),
    ("eng", Language::En),
    ("english", Language::En),
    ("ta", Language::Ta),
    ("tam", Language::Ta),
    ("tamil", Language::Ta),
    ("te", Language::Te),
    ("tel", Language::Te),
    ("telugu", Language::Te),
    ("hi", Language::Hi),
    ("hin", Language::Hi),
    ("hindi", Language::Hi),
];

/// Minimum characters inside a script block for script detection to fire.
const SCRIPT_MIN_CHARS: usize = 2;

/// Detect a language purely from Unicode script blocks.
///
/// Requires at least [`SCRIPT_MIN_CHARS`] characters in the block so that a
/// stray code point (an emoji transliteration artifact, a pasted glyph)
/// cannot flip the conversation language.
/// - Devanagari (Hindi): U+0900–U+097F
/// - Tamil:              U+0B80–U+0BFF
/// - Telugu:             U+0C00–U+0C7F
#[must_use]
pub fn detect_by_script(text: &str) -> Option<Language> {
    let mut devanagari = 0usize;
    let mut tamil = 0usize;
    let mut telugu = 0usize;

    for ch in text.chars() {
        let cp = ch as u32;
        if (0x0900..=0x097F).contains(&cp) {
            devanagari += 1;
        } else if (0x0B80..=0x0BFF).contains(&cp) {
            tamil += 1;
        } else if (0x0C00..=0x0C7F).contains(&cp) {
            telugu += 1;
        }
    }

    if devanagari >= SCRIPT_MIN_CHARS {
        Some(Language::Hi)
    } else if tamil >= SCRIPT_MIN_CHARS {
        Some(Language::Ta)
    } else if telugu >= SCRIPT_MIN_CHARS {
        Some(Language::Te)
    } else {
        None
    }
}

/// Resolve a language from free text: script evidence first, then alias
/// lookup on the whole label, its tokens, and embedded language names.
///
/// Returns `None` when the text carries no language signal at all.
#[must_use]
pub fn resolve(text: &str) -> Option<Language> {
    if let Some(lang) = detect_by_script(text) {
        return Some(lang);
    }
    // Whole label (including BCP 47-ish tags like "en-US"), individual
    // tokens ("I'd like tamil please"), then embedded language names.
    resolve_by_name(text)
}

/// Resolve a language label, falling back to the default.
#[must_use]
pub fn resolve_or_default(text: &str) -> Language {
    resolve(text).unwrap_or_default()
}

fn alias_lookup(token: &str) -> Option<Language> {
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, lang)| *lang)
}

/// Explicit language-switch request phrases, per target language.
const SWITCH_PATTERNS: &[(Language, &[&str])] = &[
    (
        Language::Ta,
        &["talk in tamil", "speak tamil", "tamil la", "tamil lo"],
    ),
    (
        Language::Te,
        &["talk in telugu", "speak telugu", "telugu lo", "telugu please"],
    ),
    (
        Language::Hi,
        &["talk in hindi", "speak hindi", "hindi mein", "hindi please"],
    ),
    (
        Language::En,
        &["talk in english", "speak english", "english please"],
    ),
];

/// Detect an explicit request to switch the conversation language.
///
/// Matches the "talk in X" phrase table first; as a fallback, a multi-word
/// utterance of at least four characters naming a non-default language
/// also counts. The fallback goes by language *name* only — script
/// evidence alone is not a switch request, or a Tamil-script wake phrase
/// would never reach the wake check.
#[must_use]
pub fn detect_switch_request(text: &str) -> Option<Language> {
    let lowered = text.to_lowercase();
    for (lang, phrases) in SWITCH_PATTERNS {
        if phrases.iter().any(|p| lowered.contains(p)) {
            return Some(*lang);
        }
    }

    let stripped = text.trim();
    if stripped.len() >= 4 && (stripped.contains(' ') || stripped.contains('-')) {
        match resolve_by_name(stripped) {
            Some(lang) if lang != Language::default() => return Some(lang),
            _ => {}
        }
    }
    None
}

/// Alias/name resolution without script detection.
fn resolve_by_name(text: &str) -> Option<Language> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let primary = normalized.split('-').next().unwrap_or(&normalized);
    if let Some(lang) = alias_lookup(primary) {
        return Some(lang);
    }
    for token in normalized.split(|c: char| !c.is_alphanumeric()) {
        if let Some(lang) = alias_lookup(token) {
            return Some(lang);
        }
    }
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| alias.len() > 3 && normalized.contains(alias))
        .map(|(_, lang)| *lang)
}

// ── Wake / sleep phrases ────────────────────────────────────────────────

const WAKE_PHRASES: [&[&str]; 4] = [
    &["hey clara"],
    &["ஹே க்ளாரா", "ஹாய் க்ளாரா", "hey clara"],
    &["హే క్లారా", "హాయ్ క్లారా", "hey clara"],
    &["हे क्लारा", "hey clara"],
];

const SLEEP_PHRASES: [&[&str]; 4] = [
    &["go idle", "sleep now", "take a break"],
    &["ஓய்வு எடு", "தூங்கிக்கொள்", "ஓய்வெணு", "go idle"],
    &["విశ్రాంతి తీసుకో", "నిద్రపో", "go idle"],
    &["सो जाओ", "आराम करो", "विराम लो", "go idle"],
];

/// Wake phrases for a language.
#[must_use]
pub fn wake_phrases(lang: Language) -> &'static [&'static str] {
    WAKE_PHRASES[lang.index()]
}

/// Sleep phrases for a language.
#[must_use]
pub fn sleep_phrases(lang: Language) -> &'static [&'static str] {
    SLEEP_PHRASES[lang.index()]
}

/// Case-insensitive substring check against a phrase list.
#[must_use]
pub fn any_phrase_in_text(text: &str, phrases: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    phrases
        .iter()
        .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
}

// ── Transcript normalization ────────────────────────────────────────────

/// Common ASR mis-transcriptions, per language: (heard, replacement).
const NORMALIZATION_MAP: [&[(&str, &str)]; 4] = [
    &[],
    &[
        ("employee", "ஊழியர்"),
        ("visitor", "வருகையாளர்"),
        ("ரிசர்ச்", "தேடல்"),
        ("ரிப்சேச்", "தேடல்"),
    ],
    &[
        ("employee", "ఉద్యోగి"),
        ("visitor", "అతిథి"),
        ("telugu", "తెలుగు"),
    ],
    &[("employee", "कर्मचारी"), ("hindi", "हिंदी")],
];

/// Lowercase a transcript and repair language-specific ASR mistakes.
#[must_use]
pub fn normalize_transcript(text: &str, lang: Language) -> String {
    let mut normalized = text.to_lowercase();
    for (heard, replacement) in NORMALIZATION_MAP[lang.index()] {
        normalized = normalized.replace(heard, replacement);
    }
    normalized
}

// ── Message catalog ─────────────────────────────────────────────────────

/// Keys into the localized message catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    WakeIntro,
    LanguageSelectionPrompt,
    LanguageSelectionRetry,
    LanguageSelectionConfirmed,
    LanguageSupportAffirm,
    ClassificationEmployee,
    ClassificationVisitor,
    ClassificationRetry,
    FaceRecognitionSuccess,
    ManualFaceNotRecognized,
    ManualNoSession,
    ManualMissingEmployeeId,
    ManualEmployeeNotFound,
    ManualDirectoryError,
    ManualNoEmailOnFile,
    ManualInvalidSession,
    ManualNotVerified,
    OtpSent,
    OtpSendFailed,
    OtpDevCode,
    OtpVerified,
    OtpIncorrect,
    OtpExhausted,
    OtpNoSession,
    EmployeeVerifiedPrompt,
    FaceRegistrationReady,
    FaceRegistrationSkipAck,
    FaceRegistrationSuccess,
    VisitorNeedName,
    VisitorNeedPhone,
    VisitorNeedPurpose,
    VisitorNeedHost,
    VisitorPhotoPrompt,
    HostNotificationPrompt,
    FlowEndPrompt,
    WakeAck,
    SleepAck,
    AlreadyAwake,
    AutoSleepNotice,
}

/// Templates per key: `[en, ta, te, hi]`.
///
/// Messages produced by backend lookups (directory/OTP internals) are
/// English in every slot, matching the upstream services they mirror.
fn templates(key: MessageKey) -> [&'static str; 4] {
    use MessageKey as K;
    match key {
        K::WakeIntro => [
            "Hello, my name is Clara, the receptionist at Info Services. How may I help you today?",
            "வணக்கம், நான் கிளாரா, இன்போ சர்வீசஸ் அலுவலகத்தின் வரவேற்பாளர். இன்று நான் எப்படி உதவலாம்?",
            "హలో, నేను క్లారా, ఇన్ఫో సర్వీసెస్ రిసెప్షనిస్ట్. ఈ రోజు మీకు ఎలా సహాయం చేయగలను?",
            "नमस्ते, मैं क्लारा हूँ, इन्फो सर्विसेस की रिसेप्शनिस्ट। आज मैं आपकी कैसे मदद कर सकती हूँ?",
        ],
        K::LanguageSelectionPrompt => [
            "I can speak English, Tamil, Telugu, and Hindi. Which one do you prefer?",
            "நான் ஆங்கிலம், தமிழ், தெலுங்கு மற்றும் இந்தி மொழிகளில் பேச முடியும். நீங்கள் எந்த மொழியை விரும்புகிறீர்கள்?",
            "నేను ఇంగ్లీష్, తమిళం, తెలుగు, హిందీ మాట్లాడగలను. మీరు ఏ భాషలో మాట్లాడాలని ఇష్టపడుతున్నారు?",
            "मैं अंग्रेज़ी, तमिल, तेलुगु और हिंदी में बात कर सकती हूँ। आप किस भाषा को पसंद करते हैं?",
        ],
        K::LanguageSelectionRetry => [
            "Please say English, Tamil, Telugu, or Hindi so I can continue.",
            "தயவுசெய்து ஆங்கிலம், தமிழ், தெலுங்கு அல்லது இந்தி என்று கூறுங்கள்.",
            "దయచేసి ఇంగ్లీష్, తమిళం, తెలుగు, లేదా హిందీలో చెప్పండి, అప్పుడు నేను కొనసాగించగలను.",
            "कृपया अंग्रेज़ी, तमिल, तेलुगु या हिंदी में से किसी एक का नाम बताइए।",
        ],
        K::LanguageSelectionConfirmed => [
            "Great! I'll speak in English. Are you an Employee or a Visitor?",
            "சிறப்பு! நான் தமிழ் மொழியில் பேசுகிறேன். நீங்கள் ஊழியரா அல்லது பார்வையாளரா?",
            "గ్రేట్! నేను తెలుగు మాట్లాడతాను. మీరు ఉద్యోగి లేదా అతిథి?",
            "बहुत बढ़िया! मैं हिंदी में बात करूँगी। क्या आप कर्मचारी हैं या आगंतुक?",
        ],
        K::LanguageSupportAffirm => [
            "I can assist you in English, Tamil, Telugu, or Hindi. How may I help you?",
            "நான் ஆங்கிலம், தமிழ், தெலுங்கு, இந்தி மொழிகளில் உதவ முடியும். எப்படி உதவலாம்?",
            "నేను మీకు ఇంగ్లీష్, తమిళం, తెలుగు, లేదా హిందీలో సహాయం చేయగలను. నేను మీకు ఎలా సహాయం చేయగలను?",
            "मैं अंग्रेज़ी, तमिल, तेलुगु या हिंदी में आपकी मदद कर सकती हूँ। मैं आपकी कैसे सहायता करूँ?",
        ],
        K::ClassificationEmployee => [
            "Great! Please show your face to the camera for recognition.",
            "சிறப்பாக இருக்கிறது! முகஅடையாளத்திற்காக கேமராவை நோக்கி பாருங்கள்.",
            "గ్రేట్! దయచేసి గుర్తింపుకోసం మీ ముఖం కెమెరాకు చూపండి.",
            "बहुत बढ़िया! पहचान के लिए कृपया कैमरा की ओर देखें।",
        ],
        K::ClassificationVisitor => [
            "Welcome! Please provide your name, phone number, purpose of visit, and who you're meeting.",
            "வரவேற்கிறோம்! உங்கள் பெயர், தொலைபேசி எண், வருகையின் காரணம், மேலும் யாரை சந்திக்கிறீர்கள் என்பதை கூறுங்கள்.",
            "వెల్కమ్! దయచేసి మీ వివరాలు చెప్పండి: పేరు, ఫోన్ నంబర్, సందర్శన కారణం, మరియు మీరు కలుసుకోవబోయే వ్యక్తి.",
            "स्वागत है! कृपया अपना नाम, फ़ोन नंबर, आने का उद्देश्य और किससे मिलने आए हैं बताइए।",
        ],
        K::ClassificationRetry => [
            "I didn't catch that. Are you an Employee or a Visitor?",
            "எனக்கு புரியவில்லை. நீங்கள் ஊழியரா அல்லது பார்வையாளரா?",
            "నాకు అర్ధం కాలేదు. మీరు ఉద్యోగి లేదా అతిథి?",
            "मुझे समझ नहीं आया। क्या आप कर्मचारी हैं या आगंतुक?",
        ],
        K::FaceRecognitionSuccess => [
            "I'm glad to see you, {name}. How can I help you today?",
            "உங்களை மீண்டும் சந்தித்ததில் மகிழ்ச்சி, {name}. இன்று எப்படி உதவலாம்?",
            "మిమ్మల్ని చూసి ఆనందంగా ఉంది {name}. ఈ రోజు ఎలా సహాయం చేయగలను?",
            "आपसे मिलकर खुशी हुई, {name}। आज मैं आपकी कैसे मदद कर सकती हूँ?",
        ],
        K::ManualFaceNotRecognized => [
            "Face not recognized. Please share your registered company email or employee ID so I can verify you manually.",
            "முகம் கண்டறியப்படவில்லை. கையேட்டு சரிபார்ப்புக்காக தயவுசெய்து உங்கள் பதிவு செய்யப்பட்ட நிறுவன மின்னஞ்சல் அல்லது ஊழியர் ஐடி அளிக்கவும்.",
            "ముఖం గుర్తించబడలేదు. దయచేసి మీ రిజిస్టర్ అయిన కంపెనీ ఇమెయిల్ లేదా ఉద్యోగ ID చెప్పండి.",
            "चेहरा पहचाना नहीं जा सका। कृपया मैनुअल सत्यापन के लिए अपना पंजीकृत कंपनी ईमेल या कर्मचारी आईडी बताइए।",
        ],
        K::ManualNoSession => [
            "No active session. Please say 'Hey Clara' to start.",
            "செயலில் இருக்கும் அமர்வு இல்லை. தொடங்க 'Hey Clara' என்று சொல்லுங்கள்.",
            "యాక్టివ్ సెషన్ లేదు. ప్రారంభించడానికి 'హే క్లారా' అని చెప్పండి.",
            "कोई सक्रिय सत्र नहीं है। प्रारंभ करने के लिए 'Hey Clara' कहिए।",
        ],
        K::ManualMissingEmployeeId => [
            "Please provide your employee ID so I can look up your registered contact details.",
            "உங்கள் ஊழியர் ஐடியைத் தெரிவிக்கவும், அதனால் நான் உங்கள் பதிவு விவரங்களை பெற முடியும்.",
            "దయచేసి మీ ఉద్యోగ ID ఇవ్వండి, అప్పుడు నేను మీ వివరాలు పొందగలను.",
            "कृपया अपना कर्मचारी आईडी बताइए ताकि मैं आपका पंजीकृत विवरण देख सकूँ।",
        ],
        K::ManualEmployeeNotFound => {
            ["Employee ID not found in employee records. Please recheck it."; 4]
        }
        K::ManualDirectoryError => [
            "I couldn't prepare verification because of an internal error ({error}). Please try again.",
            "உள் பிழை ({error}) காரணமாக சரிபார்ப்பை தயார் செய்ய முடியவில்லை. தயவுசெய்து மறுபடியும் முயற்சிக்கவும்.",
            "ఇంటర్నల్ ఎరర్ ({error}) కారణంగా వేరిఫికేషన్ సిద్ధం చేయలేకపోయాను. దయచేసి మళ్ళీ ప్రయత్నించండి.",
            "आंतरिक त्रुटि ({error}) की वजह से सत्यापन तैयार नहीं कर पाई। कृपया दोबारा प्रयास करें।",
        ],
        K::ManualNoEmailOnFile => {
            ["Unable to verify without a valid email address on file."; 4]
        }
        K::ManualInvalidSession => [
            "Invalid session or user type.",
            "அமர்வு அல்லது பயனர் வகை தவறானது.",
            "ఇన్వాలిడ్ సెషన్ లేదా యూజర్ టైప్.",
            "सत्र या उपयोगकर्ता प्रकार मान्य नहीं है।",
        ],
        K::ManualNotVerified => [
            "Invalid session or not verified yet.",
            "அமர்வு தவறானது அல்லது இன்னும் சரிபார்க்கப்படவில்லை.",
            "ఇన్వాలిడ్ సెషన్ లేదా ఇంకా వెరిఫై కాలేదు.",
            "सत्र मान्य नहीं है या अभी सत्यापन नहीं हुआ है।",
        ],
        K::OtpSent => [
            "Hi {name}, I've sent a one-time passcode via {channel}. Please tell me the code now.",
            "{name}, OTP அனுப்பியுள்ளேன். சரிபார்ப்பை நிறைவு செய்ய அதை பகிரவும்.",
            "{name}, నేను OTP పంపాను. వెరిఫికేషన్ పూర్తి చేయడానికి దయచేసి దాన్ని షేర్ చేయండి.",
            "{name}, मैंने ओटीपी भेजा है। सत्यापन पूरा करने के लिए कृपया उसे बताइए।",
        ],
        K::OtpSendFailed => [
            "I couldn't send the passcode right now ({error}). Please try again shortly.",
            "இப்போது OTP அனுப்ப முடியவில்லை ({error}). சிறிது நேரத்தில் மீண்டும் முயற்சிக்கவும்.",
            "ప్రస్తుతం OTP పంపలేకపోయాను ({error}). కొద్దిసేపటి తర్వాత మళ్లీ ప్రయత్నించండి.",
            "मैं फिलहाल ओटीपी भेज नहीं पाई ({error})। कृपया थोड़ी देर में फिर कोशिश करें।",
        ],
        K::OtpDevCode => {
            ["Development mode: OTP generated for {name}. Use this code to verify: {code}"; 4]
        }
        K::OtpVerified => ["Passcode verified. Welcome {name}!"; 4],
        K::OtpIncorrect => ["Passcode incorrect. Attempts left: {remaining}."; 4],
        K::OtpExhausted => {
            ["Too many failed passcode attempts. Please restart verification."; 4]
        }
        K::OtpNoSession => {
            ["No passcode session found. Please request a passcode first."; 4]
        }
        K::EmployeeVerifiedPrompt => [
            "You are all set. How may I assist you today?",
            "நீங்கள் தயார். இன்று எப்படி உதவலாம்?",
            "మీ అన్ని ఏర్పాట్లు పూర్తయ్యాయి. నేను ఈ రోజు ఎలా సహాయం చేయగలను?",
            "सब तैयार है। आज मैं आपकी कैसे मदद कर सकती हूँ?",
        ],
        K::FaceRegistrationReady => [
            "Please look at the camera to register your face for future quick access.",
            "அடுத்த முறை விரைவாக அணுக உங்கள் முகத்தை பதிவு செய்ய கேமராவை நோக்கிப் பாருங்கள்.",
            "దయచేసి కెమెరా వైపు చూసి మీ ముఖాన్ని రిజిస్టర్ చేసుకోండి.",
            "अगली बार तेज़ प्रवेश के लिए अपना चेहरा दर्ज कराने हेतु कैमरे की ओर देखें।",
        ],
        K::FaceRegistrationSkipAck => [
            "Perfect! You now have full access to all tools. How can I assist you today?",
            "சிறப்பானது! அனைத்து கருவிகளுக்கும் இப்போது முழு அணுகல் உங்களுக்குள்ளது. இன்று எப்படி உதவலாம்?",
            "పర్ఫెక్ట్! ఇప్పుడు మీకు అన్ని టూల్స్‌కి పూర్తి యాక్సెస్ ఉంది. ఈ రోజు నేను మీకు ఎలా సహాయం చేయగలను?",
            "बहुत बढ़िया! अब आपको सभी उपकरणों का पूरा उपयोग मिल गया है। आज मैं आपकी कैसे मदद कर सकती हूँ?",
        ],
        K::FaceRegistrationSuccess => [
            "Face registered in system! You now have full access to all tools. How can I assist you today?",
            "முகம் வெற்றிகரமாக பதிவுசெய்யப்பட்டது! அனைத்து கருவிகளிலும் உங்களுக்கு முழு அணுகல் உள்ளது. எப்படி உதவலாம்?",
            "ముఖం సిస్టమ్‌లో రిజిస్టర్ అయింది! ఇప్పుడు మీకు అన్ని టూల్స్‌కి పూర్తి యాక్సెస్ ఉంది.",
            "चेहरा सफलतापूर्वक दर्ज हो गया! अब आपको सभी उपकरणों का पूरा उपयोग मिल गया है। मैं कैसे मदद करूँ?",
        ],
        K::VisitorNeedName => [
            "Please tell me your name so I can log your visit.",
            "தயவுசெய்து உங்கள் வருகையை பதிவு செய்ய உங்கள் பெயரை கூறுங்கள்.",
            "దయచేసి మీ పేరు చెప్పండి, మీ సందర్శనను నమోదు చేయగలను.",
            "कृपया आपका नाम बताइए ताकि मैं आपकी विज़िट दर्ज कर सकूँ।",
        ],
        K::VisitorNeedPhone => [
            "Please share your phone number so I can complete the log.",
            "பதிவை முடிக்க உங்கள் தொலைபேசி எண்ணை பகிரவும்.",
            "దయచేసి మీ ఫోన్ నంబర్ చెప్పండి, లాగ్ పూర్తి చేయడానికి.",
            "कृपया आपका फ़ोन नंबर साझा कीजिए ताकि मैं रिकॉर्ड पूरा कर सकूँ।",
        ],
        K::VisitorNeedPurpose => [
            "Please let me know the purpose of your visit.",
            "உங்கள் வருகையின் காரணத்தை தெரியப்படுத்துங்கள்.",
            "దయచేసి మీ సందర్శన ఉద్దేశాన్ని చెప్పండి.",
            "कृपया अपनी विज़िट का उद्देश्य बताइए।",
        ],
        K::VisitorNeedHost => [
            "Please tell me whom you are visiting so I can notify them.",
            "நீங்கள் சந்திக்க விரும்பும் நபரின் பெயரை கூறுங்கள்.",
            "దయచేసి మీరు ఎవరిని కలుసుకోవడానికి వచ్చారో చెప్పండి, అప్పుడు వారిని తెలియజేయగలను.",
            "कृपया बताइए आप किससे मिलने आए हैं ताकि मैं उन्हें सूचित कर सकूँ।",
        ],
        K::VisitorPhotoPrompt => [
            "Thank you! I've logged your visit and notified {host}. Please look at the camera so we can capture your photo for our visitor log.",
            "நன்றி! உங்கள் வருகையை பதிவு செய்து {host} அவர்களுக்கு தெரிவித்து விட்டேன். பார்வையாளர் பதிவிற்காக தயவுசெய்து கேமராவை நோக்கிப் பாருங்கள்.",
            "ధన్యవాదాలు! మీ సందర్శనను నమోదు చేసి {host}కు తెలియజేశాను. దయచేసి ముఖం చూపండి.",
            "धन्यवाद! मैंने आपकी विज़िट दर्ज करके {host} को सूचित कर दिया है। कृपया कैमरे की ओर देखें ताकि हम आगंतुक रजिस्टर के लिए आपकी फोटो ले सकें।",
        ],
        K::HostNotificationPrompt => [
            "I have informed your host. Please wait at the reception.",
            "உங்கள் வரவேற்பாளருக்கு நான் தகவல் தெரிவித்துள்ளேன். தயவுசெய்து வரவேற்பில் காத்திருக்கவும்.",
            "నేను మీ హోస్ట్‌కి తెలియజేసాను. దయచేసి రిసెప్షన్ వద్ద వేచి ఉండండి.",
            "मैंने आपके मेजबान को सूचित कर दिया है। कृपया रिसेप्शन पर प्रतीक्षा करें।",
        ],
        K::FlowEndPrompt => [
            "Thank you! Session completed. Say 'Hey Clara' if you need more assistance.",
            "நன்றி. இன்னும் ஏதேனும் தேவையெனில் 'Hey Clara' என்று சொல்லுங்கள்.",
            "ధన్యవాదాలు. మీకు ఇంకేమైనా కావాలంటే, కేవలం 'Hey Clara' అని చెప్పండి.",
            "धन्यवाद। यदि आपको और कुछ चाहिए तो 'Hey Clara' कह दीजिए।",
        ],
        K::WakeAck => [
            "I'm awake! How can I help?",
            "நான் விழித்துள்ளேன்! எப்படி உதவலாம்?",
            "నేను మేలుకున్నాను! ఎలా సహాయం చేయగలను?",
            "मैं जाग गई हूँ! मैं कैसे मदद कर सकती हूँ?",
        ],
        K::SleepAck => [
            "Going idle, say 'Hey Clara' to wake me again.",
            "நான் ஓய்வெடுக்கிறேன், மீண்டும் எழுப்ப 'Hey Clara' என்று சொல்லுங்கள்.",
            "నేను విశ్రాంతి తీసుకుంటాను, మళ్లీ నన్ను ప్రారంభించడానికి 'హే క్లారా' అని చెప్పండి.",
            "मैं विराम ले रही हूँ, मुझे जगाने के लिए 'Hey Clara' कहें।",
        ],
        K::AlreadyAwake => [
            "Clara is already active.",
            "க்ளாரா ஏற்கனவே செயல்பாட்டில் உள்ளார்.",
            "క్లారా ఇప్పటికే యాక్టివ్‌గా ఉంది.",
            "क्लारा पहले से सक्रिय है।",
        ],
        K::AutoSleepNotice => [
            "Clara has gone idle due to inactivity. Say 'Hey Clara' to wake me up.",
            "செயல்பாட்டின்மை காரணமாக க்ளாரா ஓய்வில் உள்ளார். என்னை எழுப்ப 'Hey Clara' என்று சொல்லுங்கள்.",
            "క్లారా కొంతసేపు యాక్టివ్‌గా లేకపోవడం వలన విశ్రాంతికి వెళ్ళింది. నన్ను మళ్లీ ప్రారంభించడానికి 'హే క్లారా' అని చెప్పండి.",
            "गतिविधि न होने के कारण क्लारा विराम पर है। मुझे जगाने के लिए 'Hey Clara' कहें।",
        ],
    }
}

/// Look up a raw message template.
#[must_use]
pub fn message(key: MessageKey, lang: Language) -> &'static str {
    templates(key)[lang.index()]
}

/// Look up a template and substitute `{placeholder}` arguments.
///
/// Unknown placeholders are left in place; missing arguments are not an
/// error (the template simply keeps the brace form).
#[must_use]
pub fn render(key: MessageKey, lang: Language, args: &[(&str, &str)]) -> String {
    let mut out = message(key, lang).to_owned();
    for (placeholder, value) in args {
        out = out.replace(&format!("{{{placeholder}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn resolve_plain_codes_and_names() {
        assert_eq!(resolve("en"), Some(Language::En));
        assert_eq!(resolve("en-US"), Some(Language::En));
        assert_eq!(resolve("Tamil"), Some(Language::Ta));
        assert_eq!(resolve("i want telugu please"), Some(Language::Te));
        assert_eq!(resolve("hindi"), Some(Language::Hi));
        assert_eq!(resolve("klingon"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn script_detection_needs_two_characters() {
        // A single Tamil character is not enough evidence.
        assert_eq!(detect_by_script("hello ஹ world"), None);
        assert_eq!(detect_by_script("ஹே க்ளாரா"), Some(Language::Ta));
        assert_eq!(detect_by_script("हे क्लारा"), Some(Language::Hi));
        assert_eq!(detect_by_script("హే క్లారా"), Some(Language::Te));
        assert_eq!(detect_by_script("plain english"), None);
    }

    #[test]
    fn script_beats_embedded_alias() {
        // Tamil script with the word "hindi" inside still resolves Tamil.
        assert_eq!(resolve("ஹே க்ளாரா hindi"), Some(Language::Ta));
    }

    #[test]
    fn switch_request_phrases() {
        assert_eq!(detect_switch_request("please talk in tamil"), Some(Language::Ta));
        assert_eq!(detect_switch_request("SPEAK HINDI"), Some(Language::Hi));
        assert_eq!(detect_switch_request("telugu please"), Some(Language::Te));
        assert_eq!(detect_switch_request("english please"), Some(Language::En));
        assert_eq!(detect_switch_request("what's the weather"), None);
    }

    #[test]
    fn switch_request_fallback_ignores_default_language() {
        // A multi-word utterance resolving to English is not a switch
        // request; only non-default languages count in the fallback.
        assert_eq!(detect_switch_request("good morning english muffin"), None);
        assert_eq!(detect_switch_request("good morning there"), None);
        // Name-based fallback: "give me tamil" names the language.
        assert_eq!(detect_switch_request("give me tamil"), Some(Language::Ta));
        // Script evidence alone is not a switch request — a Tamil wake
        // phrase must still reach the wake check.
        assert_eq!(detect_switch_request("ஹே க்ளாரா"), None);
    }

    #[test]
    fn wake_phrase_matching_is_case_insensitive() {
        assert!(any_phrase_in_text("HEY CLARA, are you there?", wake_phrases(Language::En)));
        assert!(any_phrase_in_text("ஹே க்ளாரா", wake_phrases(Language::Ta)));
        assert!(!any_phrase_in_text("hello clara", wake_phrases(Language::En)));
    }

    #[test]
    fn sleep_phrases_present_for_all_languages() {
        for lang in Language::ALL {
            assert!(!sleep_phrases(lang).is_empty());
            assert!(!wake_phrases(lang).is_empty());
        }
    }

    #[test]
    fn normalize_repairs_asr_mistakes() {
        let normalized = normalize_transcript("I am an Employee", Language::Ta);
        assert!(normalized.contains("ஊழியர்"));
        // English has no replacement table.
        assert_eq!(normalize_transcript("I Am An Employee", Language::En), "i am an employee");
    }

    #[test]
    fn render_substitutes_placeholders() {
        let msg = render(
            MessageKey::FaceRecognitionSuccess,
            Language::En,
            &[("name", "Asha")],
        );
        assert!(msg.contains("Asha"));
        assert!(!msg.contains("{name}"));
    }

    #[test]
    fn render_leaves_missing_placeholders() {
        let msg = render(MessageKey::FaceRecognitionSuccess, Language::En, &[]);
        assert!(msg.contains("{name}"));
    }

    #[test]
    fn every_key_has_nonempty_templates() {
        use MessageKey as K;
        let keys = [
            K::WakeIntro,
            K::LanguageSelectionPrompt,
            K::LanguageSelectionRetry,
            K::LanguageSelectionConfirmed,
            K::LanguageSupportAffirm,
            K::ClassificationEmployee,
            K::ClassificationVisitor,
            K::ClassificationRetry,
            K::FaceRecognitionSuccess,
            K::ManualFaceNotRecognized,
            K::ManualNoSession,
            K::ManualMissingEmployeeId,
            K::ManualEmployeeNotFound,
            K::ManualDirectoryError,
            K::ManualNoEmailOnFile,
            K::ManualInvalidSession,
            K::ManualNotVerified,
            K::OtpSent,
            K::OtpSendFailed,
            K::OtpDevCode,
            K::OtpVerified,
            K::OtpIncorrect,
            K::OtpExhausted,
            K::OtpNoSession,
            K::EmployeeVerifiedPrompt,
            K::FaceRegistrationReady,
            K::FaceRegistrationSkipAck,
            K::FaceRegistrationSuccess,
            K::VisitorNeedName,
            K::VisitorNeedPhone,
            K::VisitorNeedPurpose,
            K::VisitorNeedHost,
            K::VisitorPhotoPrompt,
            K::HostNotificationPrompt,
            K::FlowEndPrompt,
            K::WakeAck,
            K::SleepAck,
            K::AlreadyAwake,
            K::AutoSleepNotice,
        ];
        for key in keys {
            for lang in Language::ALL {
                assert!(!message(key, lang).is_empty(), "{key:?}/{lang}");
            }
        }
    }

    #[test]
    fn language_serde_round_trip() {
        let json = serde_json::to_string(&Language::Ta).unwrap();
        assert_eq!(json, "\"ta\"");
        let restored: Language = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, Language::Ta);
    }
}
