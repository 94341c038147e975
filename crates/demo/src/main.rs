use std::sync::Arc;
use std::time::Duration;

use model::config::Config;
use model::driver::{DriverStatus, VehicleType};
use model::location::Location;
use model::trip::{TripId, TripStatus};
use platform::RidePlatform;
use utility::id::Id;

/// Runs the happy-path scenario of §8 end to end against an
/// in-process `RidePlatform`, no transport in the loop, and prints the
/// finished trip as JSON — a scratch driver for poking at the core directly,
/// one client call at a time.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let platform = Arc::new(RidePlatform::new(Config::default()));

    let driver_id = Id::new(uuid::Uuid::new_v4());
    let vehicle_id = Id::new(uuid::Uuid::new_v4());
    let rider_id = Id::new(uuid::Uuid::new_v4());

    let pickup = Location::new(40.7128, -74.0060, 5.0, chrono::Utc::now()).unwrap();
    let destination = Location::new(40.7589, -73.9851, 5.0, chrono::Utc::now()).unwrap();

    platform
        .update_driver_position(driver_id, vehicle_id, pickup, DriverStatus::Online, VehicleType::Sedan, 4.9)
        .await
        .expect("seed driver position");

    let trip = platform
        .request_trip(rider_id, pickup, destination, VehicleType::Sedan, 1, None)
        .await
        .expect("request trip");

    let trip_id: TripId = trip.trip_id;
    let driver_accepted = wait_for_offer_and_accept(&platform, trip_id, driver_id).await;
    if !driver_accepted {
        eprintln!("no offer arrived before the demo's own poll window elapsed");
        return;
    }

    let trip = wait_for_status(&platform, trip_id, TripStatus::DriverAssigned)
        .await
        .expect("trip never reached DriverAssigned");

    let trip = platform.change_trip_status(trip.trip_id, TripStatus::DriverArriving).await.unwrap();
    let trip = platform.change_trip_status(trip.trip_id, TripStatus::DriverArrived).await.unwrap();
    let trip = platform.start_trip(trip.trip_id, pickup).await.unwrap();
    let trip = platform.complete_trip(trip.trip_id, destination, None).await.unwrap();

    println!("{}", serde_json::to_string_pretty(&trip).unwrap());

    platform.shutdown().await;
}

async fn wait_for_offer_and_accept(platform: &RidePlatform, trip_id: TripId, driver_id: model::driver::DriverId) -> bool {
    for _ in 0..200 {
        if platform.accept_offer(trip_id, driver_id).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn wait_for_status(platform: &RidePlatform, trip_id: TripId, status: TripStatus) -> Option<model::trip::Trip> {
    for _ in 0..200 {
        let trip = platform.get_trip(trip_id).await.ok()?;
        if trip.status == status {
            return Some(trip);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
