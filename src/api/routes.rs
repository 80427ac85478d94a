use actix_web::{get, patch, post, web, HttpResponse, Result as WebResult};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use crate::api::models::{
    ErrorBody, HistoryEntry, HistoryQuery, HistoryResponse, LoginRequest, ProfileFieldRequest,
    RegisterRequest,
};
use crate::api::AppState;
use crate::auth::{validate_registration, AuthError, LocalStore, User};
use crate::history::all_emotions;
use crate::profile::{ProfileEditor, ProfileError};
use crate::resources::EMERGENCY_RESOURCES;

fn auth_error(e: AuthError) -> HttpResponse {
    match e {
        AuthError::Storage(_) => {
            error!("Auth storage error: {}", e);
            HttpResponse::InternalServerError().json(ErrorBody::new(e))
        }
        _ => HttpResponse::BadRequest().json(ErrorBody::new(e)),
    }
}

fn profile_error(e: ProfileError) -> HttpResponse {
    match e {
        ProfileError::UnknownField(_) => HttpResponse::BadRequest().json(ErrorBody::new(e)),
        ProfileError::NotEditing => HttpResponse::Conflict().json(ErrorBody::new(e)),
        ProfileError::Storage(_) => {
            error!("Profile storage error: {}", e);
            HttpResponse::InternalServerError().json(ErrorBody::new(e))
        }
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorBody::new("Not signed in"))
}

// --- Auth ---

#[post("/login")]
pub async fn login(state: web::Data<AppState>, req: web::Json<LoginRequest>) -> WebResult<HttpResponse> {
    match state.auth.login(&req.email, &req.password).await {
        Ok(user) => Ok(HttpResponse::Ok().json(user)),
        Err(e) => Ok(auth_error(e)),
    }
}

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> WebResult<HttpResponse> {
    if let Err(e) = validate_registration(&req.password, &req.confirm_password) {
        return Ok(auth_error(e));
    }
    match state.auth.register(&req.name, &req.email, &req.password).await {
        Ok(user) => Ok(HttpResponse::Created().json(user)),
        Err(e) => Ok(auth_error(e)),
    }
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    if let Ok(mut slot) = state.profile.lock() {
        *slot = None;
    }
    match state.auth.logout() {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(auth_error(e)),
    }
}

#[get("/state")]
pub async fn auth_state(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.auth.state()))
}

#[get("/me")]
pub async fn me(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    match state.auth.current_user() {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Ok(unauthorized()),
    }
}

// --- Profile ---

/// The signed-in user's editor, reloaded when the user changed.
fn editor_for<'a>(
    slot: &'a mut Option<ProfileEditor>,
    store: &LocalStore,
    user: &User,
) -> Result<&'a mut ProfileEditor, ProfileError> {
    let editor = match slot.take() {
        Some(editor) if editor.user_id() == user.id => editor,
        _ => ProfileEditor::load(store, user)?,
    };
    Ok(slot.insert(editor))
}

fn with_editor<F>(state: &AppState, f: F) -> HttpResponse
where
    F: FnOnce(&mut ProfileEditor, &LocalStore) -> Result<(), ProfileError>,
{
    let Some(user) = state.auth.current_user() else {
        return unauthorized();
    };
    let mut slot = match state.profile.lock() {
        Ok(slot) => slot,
        Err(_) => return HttpResponse::InternalServerError().json(ErrorBody::new("profile lock poisoned")),
    };
    let store: &LocalStore = state.auth.store();
    let editor = match editor_for(&mut slot, store, &user) {
        Ok(editor) => editor,
        Err(e) => return profile_error(e),
    };
    match f(&mut *editor, store) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "editing": editor.is_editing(),
            "profile": editor.current(),
        })),
        Err(e) => profile_error(e),
    }
}

#[get("")]
pub async fn get_profile(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    Ok(with_editor(&state, |_, _| Ok(())))
}

#[post("/edit")]
pub async fn edit_profile(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    Ok(with_editor(&state, |editor, _| {
        editor.begin_edit();
        Ok(())
    }))
}

#[patch("")]
pub async fn set_profile_field(
    state: web::Data<AppState>,
    req: web::Json<ProfileFieldRequest>,
) -> WebResult<HttpResponse> {
    Ok(with_editor(&state, |editor, _| editor.set_field(&req.field, &req.value)))
}

#[post("/submit")]
pub async fn submit_profile(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    Ok(with_editor(&state, |editor, store| editor.submit(store).map(|_| ())))
}

#[post("/cancel")]
pub async fn cancel_profile(state: web::Data<AppState>) -> WebResult<HttpResponse> {
    Ok(with_editor(&state, |editor, _| {
        editor.cancel();
        Ok(())
    }))
}

// --- History ---

#[get("")]
pub async fn list_history(
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> WebResult<HttpResponse> {
    let Some(user) = state.auth.current_user() else {
        return Ok(unauthorized());
    };
    let filter = match query.to_filter() {
        Ok(filter) => filter,
        Err(e) => return Ok(HttpResponse::BadRequest().json(ErrorBody::new(e))),
    };

    let records = match state.store.list_for_user(&user.id).await {
        Ok(records) => records,
        Err(e) => {
            error!("Failed to load session history: {}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e)));
        }
    };

    let sessions = filter
        .apply(&records, Utc::now())
        .into_iter()
        .map(|record| HistoryEntry {
            duration_minutes: record.duration_minutes(),
            record: record.clone(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(HistoryResponse {
        emotions: all_emotions(&records),
        filter,
        sessions,
    }))
}

#[get("/{id}")]
pub async fn get_history_entry(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let Some(user) = state.auth.current_user() else {
        return Ok(unauthorized());
    };
    match state.store.get(id.into_inner()).await {
        Ok(Some(record)) if record.user_id == user.id => Ok(HttpResponse::Ok().json(HistoryEntry {
            duration_minutes: record.duration_minutes(),
            record,
        })),
        Ok(_) => Ok(HttpResponse::NotFound().finish()),
        Err(e) => {
            error!("Failed to load session: {}", e);
            Ok(HttpResponse::InternalServerError().json(ErrorBody::new(e)))
        }
    }
}

// --- Resources ---

#[get("/resources")]
pub async fn resources() -> WebResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(EMERGENCY_RESOURCES))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(resources)
        .service(
            web::scope("/auth")
                .service(login)
                .service(register)
                .service(logout)
                .service(auth_state)
                .service(me),
        )
        .service(
            web::scope("/profile")
                .service(get_profile)
                .service(set_profile_field)
                .service(edit_profile)
                .service(submit_profile)
                .service(cancel_profile),
        )
        .service(
            web::scope("/history")
                .service(list_history)
                .service(get_history_entry),
        );
}
