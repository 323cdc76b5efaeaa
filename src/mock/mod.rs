pub mod mock_camera;
pub mod mock_constants;
pub mod mock_plant;
