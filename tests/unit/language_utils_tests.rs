/*!
 * Tests for language code utilities
 */

use neuralbabel::language_utils::{
    audio_content_type, get_language_name, language_codes_match, normalize_to_part2t, validate_language_code,
    LanguagePair,
};

#[test]
fn test_validateLanguageCode_withValidCodes_shouldSucceed() {
    for code in ["en", "fr", "de", "hi", "eng", "fra", "ger", "FR", " en "] {
        assert!(validate_language_code(code).is_ok(), "{} should be valid", code);
    }
}

#[test]
fn test_validateLanguageCode_withInvalidCodes_shouldFail() {
    for code in ["", "x", "zz", "xyz", "english"] {
        assert!(validate_language_code(code).is_err(), "{} should be invalid", code);
    }
}

#[test]
fn test_languageCodesMatch_acrossFormats_shouldMatch() {
    assert!(language_codes_match("fr", "fra"));
    assert!(language_codes_match("fre", "fr"));
    assert!(language_codes_match("de", "ger"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "invalid"));
}

#[test]
fn test_normalizeToPart2t_shouldReturnThreeLetterCode() {
    assert_eq!(normalize_to_part2t("hi").unwrap(), "hin");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert!(normalize_to_part2t("zz").is_err());
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert!(get_language_name("xyz").is_err());
}

#[test]
fn test_languagePair_matches_shouldCompareByLanguage() {
    let pair = LanguagePair::new("en", "fr");
    assert!(pair.matches("en", "fr"));
    assert!(pair.matches("eng", "fre"));
    assert!(!pair.matches("fr", "en"));
    assert_eq!(pair.to_string(), "en -> fr");
}

#[test]
fn test_audioContentType_shouldMapKnownFormats() {
    assert_eq!(audio_content_type("wav"), "audio/wav");
    assert_eq!(audio_content_type("mp3"), "audio/mpeg");
    assert_eq!(audio_content_type("OGG"), "audio/ogg");
    assert_eq!(audio_content_type("flac"), "application/octet-stream");
}
