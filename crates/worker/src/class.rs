/// Execution classes used for task scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Work on the request path; a caller is waiting on it.
	Request,
	/// Timers and housekeeping (GC leases, restarts) that no caller awaits.
	Maintenance,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Request => "request",
			Self::Maintenance => "maintenance",
		}
	}
}
