//! Offer and request catalog: entity types, listing filters and offer sheets

mod offer;
mod request;
pub mod loader;

pub use offer::{LendingOffer, NewOffer, OfferFilter, OfferStatus};
pub use request::{LendingRequest, NewRequest, RequestFilter, RequestStatus, Urgency};
pub use loader::{load_offers, load_offers_from_reader, DEFAULT_OFFER_SHEET_PATH};

/// Order offers cheapest first, then by earliest creation
pub fn sort_offers(offers: &mut [LendingOffer]) {
    offers.sort_by(|a, b| {
        a.interest_rate
            .cmp(&b.interest_rate)
            .then(a.created_at.cmp(&b.created_at))
    });
}

/// Order requests most urgent first, then by earliest creation
pub fn sort_requests(requests: &mut [LendingRequest]) {
    requests.sort_by(|a, b| {
        b.urgency
            .cmp(&a.urgency)
            .then(a.created_at.cmp(&b.created_at))
    });
}
