use tracing::debug;

use query_cell::{MountedQuery, QueryKey, QueryState};
use shared_models::envelope::Pagination;

use crate::models::{Doctor, DirectoryFilter, DirectoryView, DoctorListQuery};
use crate::services::queries::{all_doctors_key, doctor_list_key, DoctorQueries};

/// The patient dashboard's doctor browser.
///
/// Without a search term it pages through the backend's list. With one it
/// filters the full directory by name and pages locally.
#[derive(Clone)]
pub struct DoctorDirectory {
    queries: DoctorQueries,
    page_size: u32,
    mounted: MountedQuery,
}

impl DoctorDirectory {
    pub fn new(queries: DoctorQueries, page_size: u32) -> Self {
        Self {
            queries,
            page_size: page_size.max(1),
            mounted: MountedQuery::new(),
        }
    }

    pub fn queries(&self) -> &DoctorQueries {
        &self.queries
    }

    /// Key of the list the directory last showed.
    pub fn mounted_key(&self) -> Option<QueryKey> {
        self.mounted.key()
    }

    pub async fn view(&self, filter: &DirectoryFilter) -> DirectoryView {
        let page = filter.page.max(1);

        match filter.search_term() {
            Some(term) => {
                debug!("Searching doctors by name {:?}", term);
                self.mounted.mount(
                    self.queries.client(),
                    &all_doctors_key(filter.specialization.as_deref()),
                );
                let state = self.queries.all_doctors(filter.specialization.clone()).await;
                let matches: Vec<Doctor> = state
                    .data
                    .as_deref()
                    .map(|doctors| doctors.iter().filter(|d| d.matches_name(term)).cloned().collect())
                    .unwrap_or_default();

                let (doctors, pagination) = paginate(matches, page, self.page_size);
                DirectoryView {
                    doctors,
                    pagination,
                    is_stale: state.is_stale,
                    error: state.error,
                }
            }
            None => {
                let query = DoctorListQuery {
                    page,
                    limit: self.page_size,
                    specialization: filter.specialization.clone(),
                };
                self.mounted.mount(self.queries.client(), &doctor_list_key(&query));
                let QueryState {
                    data,
                    error,
                    is_stale,
                    ..
                } = self.queries.doctors(query).await;

                let (doctors, pagination) = match data {
                    Some(page) => (page.items.clone(), page.pagination),
                    None => (Vec::new(), Pagination::single(0)),
                };
                DirectoryView {
                    doctors,
                    pagination,
                    is_stale,
                    error,
                }
            }
        }
    }
}

fn paginate(items: Vec<Doctor>, page: u32, page_size: u32) -> (Vec<Doctor>, Pagination) {
    let total = items.len() as u64;
    let total_pages = total.div_ceil(page_size as u64).max(1) as u32;
    let page = page.min(total_pages);
    let start = ((page - 1) * page_size) as usize;

    let doctors = items
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    (
        doctors,
        Pagination {
            page,
            limit: page_size,
            total,
            total_pages,
        },
    )
}
