//! Realtime event names and room keys shared by the server and its clients.

/// Display configuration changed (patient room)
pub const CONFIG_UPDATED: &str = "config_updated";
/// Navigation landmarks changed (patient room)
pub const LANDMARKS_UPDATED: &str = "landmarks_updated";
/// FAQs changed (patient room)
pub const FAQS_UPDATED: &str = "faqs_updated";
/// Emergency contacts changed (patient room)
pub const CONTACTS_UPDATED: &str = "contacts_updated";
/// Appointments changed (patient room)
pub const SCHEDULE_UPDATED: &str = "schedule_updated";
/// Caregiver pushed a message to the patient (patient room)
pub const URGENT_MESSAGE: &str = "urgent_message";

/// Any patient alert (caregiver room)
pub const PATIENT_ALERT: &str = "patient_alert";
/// Call request alert (broadcast)
pub const NEW_ALERT: &str = "new_alert";
/// 911 call alert (broadcast)
pub const EMERGENCY_ALERT: &str = "emergency_alert";
/// Navigation help alert (broadcast)
pub const LOCATION_ALERT: &str = "location_alert";

/// Acknowledges a room join (sent to the joining connection only)
pub const ROOM_JOINED: &str = "room_joined";

pub fn patient_room(patient_id: i32) -> String {
    format!("patient_{}", patient_id)
}

pub fn caregiver_room(caregiver_id: i32) -> String {
    format!("caregiver_{}", caregiver_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names() {
        assert_eq!(patient_room(7), "patient_7");
        assert_eq!(caregiver_room(12), "caregiver_12");
    }
}
