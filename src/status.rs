use actix_web::{get, HttpResponse, Responder};

#[get("/status")]
pub async fn view_status() -> impl Responder {
    HttpResponse::Ok().body("OK")
}
