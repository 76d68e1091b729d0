// Action handlers, one module per collection

pub mod assignment_candidate;
pub mod meeting;
pub mod poll;
pub mod projection;
pub mod projector;
pub mod projector_countdown;
pub mod user;

use crate::action::{ActionRegistry, RegistryError};

/// Register every implemented action
pub fn register_all(registry: &mut ActionRegistry) -> Result<(), RegistryError> {
    registry.register(meeting::MeetingCreate)?;

    registry.register(user::UserCreateTemporary)?;
    registry.register(user::UserUpdateTemporary)?;
    registry.register(user::UserDeleteTemporary)?;
    registry.register(user::UserSetPassword)?;

    registry.register(poll::PollTransition::start())?;
    registry.register(poll::PollTransition::stop())?;
    registry.register(poll::PollTransition::publish())?;

    registry.register(projector::ProjectorAddToPreview)?;
    registry.register(projection::ProjectionCreate)?;
    registry.register(projector_countdown::ProjectorCountdownUpdate)?;

    registry.register(assignment_candidate::AssignmentCandidateCreate)?;
    registry.register(assignment_candidate::AssignmentCandidateDelete)?;
    Ok(())
}
