//! Package ↔ message matching.
//!
//! Two directions with deliberately asymmetric tie-breaks, both evaluated
//! over explicitly ordered slices:
//! - package → message: first message (message order) containing the
//!   package's tracking id.
//! - message → package: first package (package order) whose tracking id the
//!   message contains; messages with no known id drop out.

use crate::model::Package;

/// A package paired with the message that references it, if any.
#[derive(Debug, Clone)]
pub struct MatchedPackage<'a> {
    pub package: &'a Package,
    pub message: Option<&'a str>,
}

/// For each package, in package order, the first message whose text
/// contains the package's tracking id as a substring.
pub fn match_package_messages<'a, S: AsRef<str>>(
    packages: &'a [Package],
    messages: &'a [S],
) -> Vec<MatchedPackage<'a>> {
    packages
        .iter()
        .map(|package| MatchedPackage {
            package,
            message: messages
                .iter()
                .map(AsRef::as_ref)
                .find(|message| message.contains(&package.package_id)),
        })
        .collect()
}

/// For each message, in message order, the first package whose tracking id
/// the message contains. Messages containing no known id are excluded.
pub fn match_messages_to_packages<'a, S: AsRef<str>>(
    packages: &'a [Package],
    messages: &'a [S],
) -> Vec<(&'a str, &'a Package)> {
    messages
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|message| {
            packages
                .iter()
                .find(|package| message.contains(&package.package_id))
                .map(|package| (message, package))
        })
        .collect()
}
