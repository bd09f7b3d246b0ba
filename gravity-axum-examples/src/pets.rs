//! A small in-memory pet store served through gravity-axum controllers.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::http::request::Parts;
use gravity_axum::prelude::*;
use gravity_axum::{Boundaries, BodyLimits};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: u64,
    pub name: String,
    pub tag: Option<String>,
}

#[derive(Debug, Default)]
struct Shelf {
    next_id: u64,
    pets: Vec<Pet>,
}

/// Shared storage behind every pet handler.
#[derive(Clone, Debug, Default)]
pub struct Store {
    shelf: Arc<RwLock<Shelf>>,
}

impl Store {
    pub async fn insert(&self, name: String, tag: Option<String>) -> Pet {
        let mut shelf = self.shelf.write().await;
        shelf.next_id += 1;
        let pet = Pet {
            id: shelf.next_id,
            name,
            tag,
        };
        shelf.pets.push(pet.clone());
        pet
    }

    pub async fn list(&self, tags: &[String], limit: Option<usize>) -> Vec<Pet> {
        let shelf = self.shelf.read().await;
        shelf
            .pets
            .iter()
            .filter(|pet| {
                tags.is_empty() || pet.tag.as_ref().is_some_and(|tag| tags.contains(tag))
            })
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// `GET /pets?tag=dog&tag=cat&limit=10`
#[derive(Debug, Default, BindRequest)]
#[bind(ignore_body)]
pub struct ListPets {
    #[bind(query = "tag", explode)]
    pub tags: Vec<String>,
    #[bind(query = "limit")]
    pub limit: Option<u16>,
}

impl Validate for ListPets {
    fn validate(&self, _cx: &Context<'_>) -> Result<(), BoxError> {
        if self.limit == Some(0) {
            return Err("limit must be at least 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PetList {
    pub pets: Vec<Pet>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewPet {
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// `POST /pets?dry_run=true` with a JSON `NewPet` body.
#[derive(Debug, Default, BindRequest)]
pub struct CreatePet {
    #[bind(query = "dry_run")]
    pub dry_run: bool,
    #[bind(body)]
    pub pet: NewPet,
}

impl Validate for CreatePet {
    fn validate(&self, _cx: &Context<'_>) -> Result<(), BoxError> {
        if self.pet.name.trim().is_empty() {
            return Err("name is required".into());
        }
        Ok(())
    }
}

/// Answers recoverable errors with their suggested status, and faults with
/// an opaque 500.
fn error_redirect(error: &DispatchError) -> Option<Redirect> {
    Some(Redirect::to(error.to_response()))
}

fn fault_redirect(head: &Parts, fault: &Fault) -> Option<Redirect> {
    tracing::error!(uri = %head.uri, error = %fault, "pet store fault");
    Some(Redirect::to((
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "internal error" })),
    )))
}

pub struct ListPetsHandler {
    store: Store,
}

impl Handler for ListPetsHandler {
    type Request = ListPets;
    type Response = PetList;

    async fn handle(&self, _cx: &Context<'_>, req: ListPets) -> Result<PetList, BoxError> {
        let pets = self.store.list(&req.tags, req.limit.map(usize::from)).await;
        Ok(PetList { pets })
    }

    fn boundaries() -> Boundaries<Self> {
        Boundaries::none()
            .with_error_boundary()
            .with_fault_boundary()
    }
}

impl ErrorBoundary for ListPetsHandler {
    fn error_boundary(&self, _head: &Parts, error: &DispatchError) -> Option<Redirect> {
        error_redirect(error)
    }
}

impl FaultBoundary for ListPetsHandler {
    fn fault_boundary(&self, head: &Parts, fault: &Fault) -> Option<Redirect> {
        fault_redirect(head, fault)
    }
}

pub struct CreatePetHandler {
    store: Store,
}

impl Handler for CreatePetHandler {
    type Request = CreatePet;
    type Response = Pet;

    async fn handle(&self, _cx: &Context<'_>, req: CreatePet) -> Result<Pet, BoxError> {
        let NewPet { name, tag } = req.pet;
        if req.dry_run {
            return Ok(Pet { id: 0, name, tag });
        }
        Ok(self.store.insert(name, tag).await)
    }

    fn boundaries() -> Boundaries<Self> {
        Boundaries::none()
            .with_error_boundary()
            .with_fault_boundary()
    }
}

impl ErrorBoundary for CreatePetHandler {
    fn error_boundary(&self, _head: &Parts, error: &DispatchError) -> Option<Redirect> {
        error_redirect(error)
    }
}

impl FaultBoundary for CreatePetHandler {
    fn fault_boundary(&self, head: &Parts, fault: &Fault) -> Option<Redirect> {
        fault_redirect(head, fault)
    }
}

/// Router serving `GET /pets` and `POST /pets` from one store.
pub fn router(store: Store) -> Router {
    let list = Controller::new(ListPetsHandler {
        store: store.clone(),
    });
    let create = Controller::builder(CreatePetHandler { store })
        .limits(BodyLimits::new(16 * 1024))
        .expose_trace(false)
        .build();

    Router::new().route(
        "/pets",
        axum::routing::get_service(list).post_service(create),
    )
}
