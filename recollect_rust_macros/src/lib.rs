mod recordable;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Recordable)]
// ============================================================================

/// Derive the attribute table a tracker uses for named properties.
///
/// Every named field becomes an attribute with the field's name. Field types
/// must implement `serde::Serialize` and `serde::de::DeserializeOwned`.
///
/// ```ignore
/// #[derive(Recordable)]
/// struct Preferences {
///     volume: u8,
///     #[recall(rename = "colour")]
///     color: String,
///     #[recall(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// Field options:
/// - `#[recall(skip)]`: leave the field out of the table
/// - `#[recall(rename = "name")]`: expose the field under another name
#[proc_macro_derive(Recordable, attributes(recall))]
pub fn derive_recordable(input: TokenStream) -> TokenStream {
    recordable::derive_recordable(input)
}
