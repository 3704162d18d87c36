use std::collections::HashMap;

pub const DEFAULT_LOCALE: &str = "en";

pub trait Translator: Send + Sync {
    /// Returns the text for `key` in `locale`, or `None` when it has no entry.
    fn translate(&self, key: &str, locale: &str) -> Option<String>;
}

const EN: &[(&str, &str)] = &[
    ("errors.somethingWentWrong", "Something went wrong"),
    ("errors.auth.unauthorized", "You need to be logged in"),
    ("errors.auth.notAdmin", "This action is reserved to administrators"),
    ("errors.books.notFound", "Book not found"),
    ("errors.books.alreadyExists", "This book already exists"),
    ("errors.reviews.notFound", "Review not found"),
    ("errors.reviews.alreadyExists", "You already reviewed this book"),
    ("errors.quotes.notFound", "Quote not found"),
    ("errors.quotes.notOwner", "You can only delete your own quotes"),
    ("errors.readingLists.notFound", "Reading list not found"),
    ("errors.readingLists.notOwner", "This reading list belongs to someone else"),
    ("errors.celebrities.notFound", "Celebrity not found"),
    ("errors.users.notFound", "User not found"),
    ("errors.invalid.shelfStatus", "Unknown shelf status"),
    ("errors.invalid.rating", "The rating must be between 1 and 5"),
    ("errors.invalid.comment", "The comment is too long"),
    ("errors.invalid.text", "The quote must have between 1 and 500 characters"),
    ("errors.invalid.description", "The description must have between 10 and 5000 characters"),
    ("errors.invalid.title", "The title can not be empty"),
    ("errors.invalid.image", "The file must be an image"),
    ("errors.invalid.upload", "The upload is malformed"),
    ("errors.invalid.userName", "Invalid user name"),
    ("errors.files.notFound", "File not found"),
];

const FR: &[(&str, &str)] = &[
    ("errors.somethingWentWrong", "Une erreur est survenue"),
    ("errors.auth.unauthorized", "Vous devez être connecté"),
    ("errors.auth.notAdmin", "Cette action est réservée aux administrateurs"),
    ("errors.books.notFound", "Livre introuvable"),
    ("errors.books.alreadyExists", "Ce livre existe déjà"),
    ("errors.reviews.notFound", "Avis introuvable"),
    ("errors.reviews.alreadyExists", "Vous avez déjà donné votre avis sur ce livre"),
    ("errors.quotes.notFound", "Citation introuvable"),
    ("errors.quotes.notOwner", "Vous ne pouvez supprimer que vos propres citations"),
    ("errors.readingLists.notFound", "Liste de lecture introuvable"),
    ("errors.readingLists.notOwner", "Cette liste de lecture appartient à quelqu'un d'autre"),
    ("errors.celebrities.notFound", "Célébrité introuvable"),
    ("errors.users.notFound", "Utilisateur introuvable"),
    ("errors.invalid.shelfStatus", "Statut d'étagère inconnu"),
    ("errors.invalid.rating", "La note doit être comprise entre 1 et 5"),
    ("errors.invalid.comment", "Le commentaire est trop long"),
    ("errors.invalid.text", "La citation doit contenir entre 1 et 500 caractères"),
    ("errors.invalid.description", "La description doit contenir entre 10 et 5000 caractères"),
    ("errors.invalid.title", "Le titre ne peut pas être vide"),
    ("errors.invalid.image", "Le fichier doit être une image"),
    ("errors.invalid.upload", "L'envoi est mal formé"),
    ("errors.invalid.userName", "Nom d'utilisateur invalide"),
    ("errors.files.notFound", "Fichier introuvable"),
];

/// Translations compiled into the binary.
pub struct StaticTranslator {
    tables: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl Default for StaticTranslator {
    fn default() -> Self {
        let tables = [("en", EN), ("fr", FR)]
            .into_iter()
            .map(|(locale, table)| (locale, table.iter().copied().collect()))
            .collect();

        Self { tables }
    }
}

impl Translator for StaticTranslator {
    fn translate(&self, key: &str, locale: &str) -> Option<String> {
        self.tables
            .get(locale)
            .or_else(|| self.tables.get(DEFAULT_LOCALE))?
            .get(key)
            .map(|t| t.to_string())
    }
}

/// Primary language of an `Accept-Language` header, ignoring quality values:
/// `fr-CH, fr;q=0.9, en;q=0.8` is `fr`.
pub fn primary_locale(accept_language: Option<&str>) -> String {
    accept_language
        .and_then(|h| h.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .and_then(|tag| tag.trim().split('-').next())
        .filter(|lang| !lang.is_empty() && *lang != "*")
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_LOCALE.to_string())
}
